//! Ephemeral per-session challenge state and the inbound gameplay event.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::constants::{EVENT_CHALLENGE_COMPLETED, EVENT_FIELD_CHALLENGE_ID, STATE_START};
use crate::definition::{ChallengeDefinition, GameVersion};
use crate::progression::PersistentProgression;

/// Timer state owned by the evaluator; the engine only stores and hands it back.
pub type Timer = Value;

/// A decoded gameplay event as reported by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameplayEvent {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub contract_session_id: String,
}

impl GameplayEvent {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: 0.0,
            contract_id: String::new(),
            contract_session_id: String::new(),
        }
    }

    /// Synthetic event replayed when a challenge in `session` completes.
    #[must_use]
    pub fn challenge_completed(challenge_id: &str, session: &ContractSession) -> Self {
        Self {
            name: EVENT_CHALLENGE_COMPLETED.to_string(),
            value: json!({ EVENT_FIELD_CHALLENGE_ID: challenge_id }),
            timestamp: session.last_timestamp,
            contract_id: session.contract_id.clone(),
            contract_session_id: session.session_id.clone(),
        }
    }
}

/// Working copy of one challenge's state inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionChallengeContext {
    pub context: Value,
    pub state: String,
    #[serde(default)]
    pub timers: Vec<Timer>,
    #[serde(default)]
    pub times_completed: u32,
}

impl SessionChallengeContext {
    /// Context seeded from defaults, or from persisted progress when present.
    #[must_use]
    pub fn seeded(
        definition: &ChallengeDefinition,
        progression: Option<&PersistentProgression>,
    ) -> Self {
        match progression {
            Some(progression) if definition.scope.is_persistent() => {
                // Completed records stay in the terminal state; a repeatable run starts over.
                let state = if definition.repeatable && progression.completed {
                    STATE_START.to_string()
                } else {
                    progression.current_state.clone()
                };
                Self {
                    context: progression.state.clone(),
                    state,
                    timers: Vec::new(),
                    times_completed: 0,
                }
            }
            _ => Self {
                context: definition.context.clone(),
                state: STATE_START.to_string(),
                timers: Vec::new(),
                times_completed: 0,
            },
        }
    }
}

/// One active contract playthrough. Owns its context map exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContractSession {
    pub session_id: String,
    pub user_id: String,
    pub game_version: GameVersion,
    pub contract_id: String,
    pub location_id: String,
    #[serde(default)]
    pub difficulty: u32,
    /// Iteration order is the dispatch order within an event.
    #[serde(default)]
    pub challenge_contexts: IndexMap<String, SessionChallengeContext>,
    #[serde(default)]
    pub last_timestamp: f64,
}

impl ContractSession {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        game_version: GameVersion,
        contract_id: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            game_version,
            contract_id: contract_id.into(),
            location_id: location_id.into(),
            difficulty: 0,
            challenge_contexts: IndexMap::new(),
            last_timestamp: 0.0,
        }
    }

    /// Attach a context for `definition`, replacing any existing one.
    pub fn seed_challenge(
        &mut self,
        definition: &ChallengeDefinition,
        progression: Option<&PersistentProgression>,
    ) {
        self.challenge_contexts.insert(
            definition.id.clone(),
            SessionChallengeContext::seeded(definition, progression),
        );
    }

    #[must_use]
    pub fn context(&self, challenge_id: &str) -> Option<&SessionChallengeContext> {
        self.challenge_contexts.get(challenge_id)
    }

    pub fn context_mut(&mut self, challenge_id: &str) -> Option<&mut SessionChallengeContext> {
        self.challenge_contexts.get_mut(challenge_id)
    }

    #[must_use]
    pub fn tracks(&self, challenge_id: &str) -> bool {
        self.challenge_contexts.contains_key(challenge_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ChallengeScope;
    use crate::progression::PersistentProgression;

    #[test]
    fn completion_event_carries_challenge_id_and_session() {
        let mut session = ContractSession::new("s1", "u1", GameVersion::H3, "c1", "LOC");
        session.last_timestamp = 42.5;
        let event = GameplayEvent::challenge_completed("kill-five", &session);
        assert_eq!(event.name, EVENT_CHALLENGE_COMPLETED);
        assert_eq!(event.value, json!({"ChallengeId": "kill-five"}));
        assert!((event.timestamp - 42.5).abs() < f64::EPSILON);
        assert_eq!(event.contract_session_id, "s1");
    }

    #[test]
    fn only_persistent_scopes_seed_from_progression() {
        let mut def = ChallengeDefinition::new("c1");
        def.context = json!({"Count": 0});
        let mut stored = PersistentProgression::fresh(&def);
        stored.state = json!({"Count": 4});
        stored.current_state = "Counting".into();

        let session_ctx = SessionChallengeContext::seeded(&def, Some(&stored));
        assert_eq!(session_ctx.context, json!({"Count": 0}));
        assert_eq!(session_ctx.state, STATE_START);

        def.scope = ChallengeScope::Profile;
        let profile_ctx = SessionChallengeContext::seeded(&def, Some(&stored));
        assert_eq!(profile_ctx.context, json!({"Count": 4}));
        assert_eq!(profile_ctx.state, "Counting");
    }

    #[test]
    fn completed_repeatable_progress_seeds_a_fresh_run() {
        let mut def = ChallengeDefinition::new("c1");
        def.scope = ChallengeScope::Profile;
        let mut stored = PersistentProgression::fresh(&def);
        stored.completed = true;
        stored.current_state = crate::constants::STATE_SUCCESS.into();
        stored.state = json!({"Count": 1});

        let once = SessionChallengeContext::seeded(&def, Some(&stored));
        assert_eq!(once.state, crate::constants::STATE_SUCCESS);

        def.repeatable = true;
        let again = SessionChallengeContext::seeded(&def, Some(&stored));
        assert_eq!(again.state, STATE_START);
        assert_eq!(again.context, json!({"Count": 1}));
    }

    #[test]
    fn event_parses_from_client_json() {
        let event: GameplayEvent = serde_json::from_value(json!({
            "Name": "Kill",
            "Value": {"RepoId": "guard"},
            "Timestamp": 12.0,
            "ContractId": "c1",
            "ContractSessionId": "s1"
        }))
        .unwrap();
        assert_eq!(event.name, "Kill");
        assert_eq!(event.value["RepoId"], "guard");
    }
}
