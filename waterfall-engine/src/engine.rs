//! Per-event processing: one borrowed view over every collaborator.
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{ChallengeError, ContentError};
use crate::evaluator::StateMachineEvaluator;
use crate::hooks::CompletionHooks;
use crate::progression::UserRecord;
use crate::registry::ChallengeRegistry;
use crate::session::{ContractSession, GameplayEvent};
use crate::{RewardGranter, UserDataStore};

/// A challenge completed while processing an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRecord {
    pub challenge_id: String,
    /// Dependency whose completion cascaded into this one.
    pub via_parent: Option<String>,
}

/// An evaluator failure isolated to a single challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationFailure {
    pub challenge_id: String,
    pub message: String,
}

/// What one event did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventReport {
    pub event_name: String,
    pub completed: Vec<CompletionRecord>,
    pub evaluation_failures: Vec<EvaluationFailure>,
    pub persisted_writes: usize,
    pub cascade_steps: usize,
}

impl EventReport {
    #[must_use]
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed_ids(&self) -> Vec<&str> {
        self.completed
            .iter()
            .map(|record| record.challenge_id.as_str())
            .collect()
    }
}

/// Dispatcher and cascade engine bound to one registry snapshot.
///
/// Cheap to build; callers construct one per event.
pub struct ProgressEngine<'a> {
    pub(crate) registry: &'a ChallengeRegistry,
    pub(crate) evaluator: &'a dyn StateMachineEvaluator,
    pub(crate) store: &'a dyn UserDataStore,
    pub(crate) rewards: &'a dyn RewardGranter,
    pub(crate) hooks: &'a CompletionHooks,
    pub(crate) config: &'a EngineConfig,
}

impl<'a> ProgressEngine<'a> {
    #[must_use]
    pub fn new(
        registry: &'a ChallengeRegistry,
        evaluator: &'a dyn StateMachineEvaluator,
        store: &'a dyn UserDataStore,
        rewards: &'a dyn RewardGranter,
        hooks: &'a CompletionHooks,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            registry,
            evaluator,
            store,
            rewards,
            hooks,
            config,
        }
    }

    /// Route one gameplay event through the session and run every cascade it causes.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::Persistence` when a write or reward grant fails; the
    /// session keeps every update made before the failure. Content errors surface only
    /// in strict mode, and `ContentError::CascadeLimit` when the step budget runs out.
    pub fn process_event(
        &self,
        session: &mut ContractSession,
        user: &mut UserRecord,
        event: &GameplayEvent,
    ) -> Result<EventReport, ChallengeError> {
        let mut report = EventReport::new(event.name.as_str());
        session.last_timestamp = event.timestamp;
        let newly_succeeded = self.dispatch(session, user, event, &mut report)?;
        self.run_cascade(
            session,
            user,
            crate::cascade::initial_completions(newly_succeeded),
            &mut report,
        )?;
        Ok(report)
    }

    /// Log and swallow a content error, or fail the event in strict mode.
    pub(crate) fn content_fault(&self, err: ContentError) -> Result<(), ChallengeError> {
        if self.config.is_strict() {
            return Err(err.into());
        }
        log::warn!("{err}");
        Ok(())
    }

    pub(crate) fn persist(
        &self,
        session: &ContractSession,
        user: &UserRecord,
        report: &mut EventReport,
    ) -> Result<(), ChallengeError> {
        self.store
            .write_user_data(&session.user_id, session.game_version, user)?;
        report.persisted_writes += 1;
        Ok(())
    }
}
