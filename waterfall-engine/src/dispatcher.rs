//! Fan-out of one event to every challenge context in a session.
use crate::constants::STATE_SUCCESS;
use crate::engine::{EvaluationFailure, EventReport, ProgressEngine};
use crate::error::{ChallengeError, ContentError};
use crate::evaluator::EvaluationOptions;
use crate::progression::UserRecord;
use crate::session::{ContractSession, GameplayEvent};

impl ProgressEngine<'_> {
    /// Evaluate `event` against each tracked challenge, in context-map order.
    ///
    /// Returns the challenges that moved into `Success` during this pass. Cascades
    /// are left to the caller.
    pub(crate) fn dispatch(
        &self,
        session: &mut ContractSession,
        user: &mut UserRecord,
        event: &GameplayEvent,
        report: &mut EventReport,
    ) -> Result<Vec<String>, ChallengeError> {
        let game_version = session.game_version;
        let tracked: Vec<String> = session.challenge_contexts.keys().cloned().collect();
        let mut succeeded = Vec::new();

        for challenge_id in tracked {
            let Some(definition) = self.registry.get_challenge_by_id(&challenge_id, game_version)
            else {
                self.content_fault(ContentError::UnknownChallenge {
                    id: challenge_id,
                    game_version,
                })?;
                continue;
            };
            if user.is_completed(&challenge_id) && !definition.repeatable {
                continue;
            }
            let Some(current) = session.context(&challenge_id) else {
                continue;
            };

            let prior_state = current.state.clone();
            let options = EvaluationOptions {
                event_name: &event.name,
                current_state: &current.state,
                timers: &current.timers,
                timestamp: event.timestamp,
                contract_id: &session.contract_id,
            };
            let evaluation = match self.evaluator.evaluate(
                &definition.state_machine,
                current.context.clone(),
                &event.value,
                &options,
            ) {
                Ok(evaluation) => evaluation,
                Err(err) => {
                    log::error!(
                        "evaluating {challenge_id} on {} for {} failed: {err}",
                        event.name,
                        session.user_id
                    );
                    report.evaluation_failures.push(EvaluationFailure {
                        challenge_id,
                        message: err.message,
                    });
                    continue;
                }
            };

            let context = evaluation
                .context
                .unwrap_or_else(|| definition.context.clone());
            let reached_success =
                prior_state != STATE_SUCCESS && evaluation.state == STATE_SUCCESS;

            // Only a changed record is written back.
            let mirrored = definition.scope.is_persistent() && {
                let before = user.progression(&challenge_id).cloned();
                let progression = user.progression_mut(definition);
                progression.state = context.clone();
                progression.current_state.clone_from(&evaluation.state);
                progression.heal();
                before.as_ref() != Some(&*progression)
            };

            if let Some(entry) = session.context_mut(&challenge_id) {
                entry.state = evaluation.state;
                entry.context = context;
                if let Some(timers) = evaluation.timers {
                    entry.timers = timers;
                }
            }

            // Session state is not rolled back if the write fails.
            if mirrored {
                self.persist(session, user, report)?;
            }

            if reached_success {
                log::debug!("{challenge_id} reached {STATE_SUCCESS} on {}", event.name);
                succeeded.push(challenge_id);
            }
        }

        Ok(succeeded)
    }
}
