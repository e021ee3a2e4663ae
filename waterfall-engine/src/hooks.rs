//! Completion notifications for listeners outside the engine.
use std::fmt;
use std::sync::Arc;

use crate::definition::{ChallengeDefinition, GameVersion};

/// Payload delivered to every completion listener.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeCompleted<'a> {
    pub user_id: &'a str,
    pub definition: &'a ChallengeDefinition,
    pub game_version: GameVersion,
    /// Challenge whose completion cascaded into this one.
    pub via_parent: Option<&'a str>,
}

pub trait CompletionListener: Send + Sync {
    /// # Errors
    ///
    /// Failures are logged by the engine and never abort event processing.
    fn on_challenge_completed(&self, event: &ChallengeCompleted<'_>) -> anyhow::Result<()>;
}

impl<F> CompletionListener for F
where
    F: Fn(&ChallengeCompleted<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn on_challenge_completed(&self, event: &ChallengeCompleted<'_>) -> anyhow::Result<()> {
        self(event)
    }
}

/// Fan-out list of completion listeners.
#[derive(Clone, Default)]
pub struct CompletionHooks {
    listeners: Vec<Arc<dyn CompletionListener>>,
}

impl fmt::Debug for CompletionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHooks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CompletionHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: impl CompletionListener + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener. Returns the number of listeners that failed.
    pub fn fire(&self, event: &ChallengeCompleted<'_>) -> usize {
        let mut failures = 0;
        for listener in &self.listeners {
            if let Err(err) = listener.on_challenge_completed(event) {
                failures += 1;
                log::error!(
                    "completion listener failed for {} ({}): {err:#}",
                    event.definition.id,
                    event.user_id
                );
            }
        }
        failures
    }
}
