//! Durable per-user challenge progress.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{STATE_START, STATE_SUCCESS};
use crate::definition::ChallengeDefinition;

/// Persisted progress for one user and one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersistentProgression {
    /// Monotonic: never reverts once set.
    #[serde(default)]
    pub completed: bool,
    /// Whether the completion has been shown in the player-facing summary.
    #[serde(default)]
    pub ticked: bool,
    #[serde(default = "default_state")]
    pub current_state: String,
    #[serde(default)]
    pub state: Value,
}

fn default_state() -> String {
    STATE_START.to_string()
}

impl PersistentProgression {
    /// Fresh progress seeded from the definition's default context.
    #[must_use]
    pub fn fresh(definition: &ChallengeDefinition) -> Self {
        Self {
            completed: false,
            ticked: false,
            current_state: default_state(),
            state: definition.context.clone(),
        }
    }

    /// Force completed records into the terminal state.
    ///
    /// Returns true when the record had to be repaired.
    pub fn heal(&mut self) -> bool {
        if self.completed && self.current_state != STATE_SUCCESS {
            self.current_state = STATE_SUCCESS.to_string();
            return true;
        }
        false
    }

    fn mark_completed(&mut self) {
        self.completed = true;
        self.ticked = false;
        self.current_state = STATE_SUCCESS.to_string();
    }
}

/// The user-data object the engine mutates for the duration of one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default)]
    pub challenge_progression: BTreeMap<String, PersistentProgression>,
}

impl UserRecord {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            challenge_progression: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn progression(&self, challenge_id: &str) -> Option<&PersistentProgression> {
        self.challenge_progression.get(challenge_id)
    }

    /// Progress for a challenge, created with defaults on first access.
    pub fn progression_mut(
        &mut self,
        definition: &ChallengeDefinition,
    ) -> &mut PersistentProgression {
        let progression = self
            .challenge_progression
            .entry(definition.id.clone())
            .or_insert_with(|| PersistentProgression::fresh(definition));
        progression.heal();
        progression
    }

    #[must_use]
    pub fn is_completed(&self, challenge_id: &str) -> bool {
        self.challenge_progression
            .get(challenge_id)
            .is_some_and(|p| p.completed)
    }

    /// Set `Completed`, creating the record with defaults when absent.
    pub fn mark_completed(&mut self, definition: &ChallengeDefinition) {
        let progression = self.progression_mut(definition);
        if !progression.completed {
            progression.mark_completed();
        }
    }

    /// Repair every record written before the terminal-state invariant existed.
    pub fn heal_all(&mut self) -> usize {
        self.challenge_progression
            .values_mut()
            .map(PersistentProgression::heal)
            .filter(|repaired| *repaired)
            .count()
    }

    /// Completed challenges not yet shown to the player; marks them ticked.
    pub fn take_unticked(&mut self) -> Vec<String> {
        let mut unticked = Vec::new();
        for (id, progression) in &mut self.challenge_progression {
            if progression.completed && !progression.ticked {
                progression.ticked = true;
                unticked.push(id.clone());
            }
        }
        unticked
    }
}
