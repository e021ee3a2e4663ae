//! Completion cascade ("waterfall").
//!
//! Completions are driven by an explicit LIFO worklist rather than recursion.
//! Each completion first replays the synthetic `ChallengeCompleted` event, then
//! finishes its own bookkeeping, then tries every dependent challenge in
//! registry order. Because the stack is last-in-first-out, a completion caused
//! by a candidate is fully cascaded before the next candidate is examined.
use std::collections::HashSet;

use crate::constants::{EVENT_CHALLENGE_COMPLETED, STATE_START, TAG_GLOBAL};
use crate::dependency::extract_dependencies;
use crate::engine::{CompletionRecord, EventReport, ProgressEngine};
use crate::error::{ChallengeError, ContentError};
use crate::hooks::ChallengeCompleted;
use crate::progression::UserRecord;
use crate::session::{ContractSession, GameplayEvent};
use crate::ProgressionGrant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Replay the completion event for a challenge that just succeeded.
    Complete {
        challenge_id: String,
        via_parent: Option<String>,
    },
    /// Persist, reward and notify, then queue dependents.
    Finish {
        challenge_id: String,
        via_parent: Option<String>,
    },
    /// Check whether a dependent is now complete.
    Try {
        challenge_id: String,
        parent_id: String,
    },
}

/// Worklist for challenges that succeeded during a dispatch pass, first on top.
pub(crate) fn initial_completions(succeeded: Vec<String>) -> Vec<Step> {
    succeeded
        .into_iter()
        .rev()
        .map(|challenge_id| Step::Complete {
            challenge_id,
            via_parent: None,
        })
        .collect()
}

impl ProgressEngine<'_> {
    /// Complete `challenge_id` and cascade to everything that depends on it.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressEngine::process_event`].
    pub fn on_challenge_completed(
        &self,
        session: &mut ContractSession,
        user: &mut UserRecord,
        challenge_id: &str,
        via_parent: Option<&str>,
    ) -> Result<EventReport, ChallengeError> {
        let mut report = EventReport::new(EVENT_CHALLENGE_COMPLETED);
        let steps = vec![Step::Complete {
            challenge_id: challenge_id.to_string(),
            via_parent: via_parent.map(str::to_string),
        }];
        self.run_cascade(session, user, steps, &mut report)?;
        Ok(report)
    }

    /// Complete `challenge_id` if `parent_id` was the last thing it was waiting on.
    ///
    /// Does nothing when the challenge is already complete, when it is its own
    /// parent, or when `parent_id` is not one of its dependencies.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressEngine::process_event`].
    pub fn try_to_complete_challenge(
        &self,
        session: &mut ContractSession,
        user: &mut UserRecord,
        challenge_id: &str,
        parent_id: &str,
    ) -> Result<EventReport, ChallengeError> {
        let mut report = EventReport::new(EVENT_CHALLENGE_COMPLETED);
        let steps = vec![Step::Try {
            challenge_id: challenge_id.to_string(),
            parent_id: parent_id.to_string(),
        }];
        self.run_cascade(session, user, steps, &mut report)?;
        Ok(report)
    }

    pub(crate) fn run_cascade(
        &self,
        session: &mut ContractSession,
        user: &mut UserRecord,
        mut worklist: Vec<Step>,
        report: &mut EventReport,
    ) -> Result<(), ChallengeError> {
        let mut completed_this_event: HashSet<String> = HashSet::new();

        while let Some(step) = worklist.pop() {
            report.cascade_steps += 1;
            if report.cascade_steps > self.config.max_cascade_steps {
                return Err(ContentError::CascadeLimit {
                    limit: self.config.max_cascade_steps,
                    event: report.event_name.clone(),
                }
                .into());
            }

            match step {
                Step::Complete {
                    challenge_id,
                    via_parent,
                } => {
                    if !completed_this_event.insert(challenge_id.clone()) {
                        log::debug!("{challenge_id} already completed during this event");
                        continue;
                    }
                    if self
                        .registry
                        .get_challenge_by_id(&challenge_id, session.game_version)
                        .is_none()
                    {
                        self.content_fault(ContentError::UnknownChallenge {
                            id: challenge_id,
                            game_version: session.game_version,
                        })?;
                        continue;
                    }

                    let replay = GameplayEvent::challenge_completed(&challenge_id, session);
                    let succeeded = self.dispatch(session, user, &replay, report)?;
                    worklist.push(Step::Finish {
                        challenge_id,
                        via_parent,
                    });
                    worklist.extend(initial_completions(succeeded));
                }
                Step::Finish {
                    challenge_id,
                    via_parent,
                } => {
                    let dependents = self.finish(session, user, &challenge_id, via_parent, report)?;
                    worklist.extend(dependents.into_iter().rev().map(|dependent| Step::Try {
                        challenge_id: dependent,
                        parent_id: challenge_id.clone(),
                    }));
                }
                Step::Try {
                    challenge_id,
                    parent_id,
                } => {
                    if self.completion_ready(session, user, &challenge_id, &parent_id)? {
                        worklist.push(Step::Complete {
                            challenge_id,
                            via_parent: Some(parent_id),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Persist, reward and notify. Returns the dependents to try next.
    fn finish(
        &self,
        session: &mut ContractSession,
        user: &mut UserRecord,
        challenge_id: &str,
        via_parent: Option<String>,
        report: &mut EventReport,
    ) -> Result<Vec<String>, ChallengeError> {
        let game_version = session.game_version;
        let Some(definition) = self.registry.get_challenge_by_id(challenge_id, game_version)
        else {
            return Ok(Vec::new());
        };

        if !definition.has_tag(TAG_GLOBAL) {
            user.mark_completed(definition);
        }

        if let Some(entry) = session.context_mut(challenge_id) {
            entry.times_completed += 1;
            if definition.repeatable {
                entry.state = STATE_START.to_string();
            }
        }

        let grant = ProgressionGrant::for_challenge(definition, &session.location_id);
        self.rewards.grant_progression(&grant, session, user)?;
        // One write covers the completion flag and whatever the grant changed.
        self.persist(session, user, report)?;

        self.hooks.fire(&ChallengeCompleted {
            user_id: &session.user_id,
            definition,
            game_version,
            via_parent: via_parent.as_deref(),
        });
        log::info!(
            "challenge {challenge_id} completed for {} ({game_version})",
            session.user_id
        );
        report.completed.push(CompletionRecord {
            challenge_id: challenge_id.to_string(),
            via_parent,
        });

        Ok(self
            .registry
            .dependent_challenge_ids(game_version)
            .filter(|id| *id != challenge_id)
            .map(str::to_string)
            .collect())
    }

    /// Guards, then the counter rule or the all-dependencies rule.
    fn completion_ready(
        &self,
        session: &ContractSession,
        user: &UserRecord,
        challenge_id: &str,
        parent_id: &str,
    ) -> Result<bool, ChallengeError> {
        if user.is_completed(challenge_id) || challenge_id == parent_id {
            return Ok(false);
        }
        let game_version = session.game_version;
        let Some(edges) = self
            .registry
            .get_dependencies_for_challenge(challenge_id, game_version)
        else {
            self.content_fault(ContentError::MissingDependencyTree {
                id: challenge_id.to_string(),
                game_version,
            })?;
            return Ok(false);
        };
        if !edges.iter().any(|edge| edge == parent_id) {
            return Ok(false);
        }
        let Some(definition) = self.registry.get_challenge_by_id(challenge_id, game_version) else {
            self.content_fault(ContentError::UnknownChallenge {
                id: challenge_id.to_string(),
                game_version,
            })?;
            return Ok(false);
        };

        let context = user
            .progression(challenge_id)
            .map_or(&definition.context, |progression| &progression.state);

        let info = extract_dependencies(definition, context);
        let ready = match info.active_counter() {
            Some(counter) => counter.within_one_of_total(),
            None => info
                .dependency_challenge_ids
                .iter()
                .all(|dependency| user.is_completed(dependency)),
        };
        log::debug!("try {challenge_id} via {parent_id}: ready={ready}");
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_success_ends_up_on_top() {
        let steps = initial_completions(vec!["a".into(), "b".into()]);
        assert_eq!(
            steps.last(),
            Some(&Step::Complete {
                challenge_id: "a".into(),
                via_parent: None
            })
        );
    }
}
