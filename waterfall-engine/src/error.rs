//! Error taxonomy for the challenge engine.
use thiserror::Error;

use crate::definition::GameVersion;

/// Top-level error returned by fallible engine entry points.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("contract {0} could not be resolved")]
    UnknownContract(String),
}

/// Problems with authored content: missing challenges, broken dependency data.
#[derive(Debug, Error, PartialEq)]
pub enum ContentError {
    #[error("challenge {id} is not registered for {game_version}")]
    UnknownChallenge { id: String, game_version: GameVersion },
    #[error("challenge {id} has no dependency tree entry for {game_version}")]
    MissingDependencyTree { id: String, game_version: GameVersion },
    #[error("challenge {id} lists itself as a dependency")]
    SelfDependency { id: String },
    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },
    #[error("cascade exceeded {limit} steps while processing {event}")]
    CascadeLimit { limit: usize, event: String },
    #[error("content pack is malformed: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Failures reported by the user-data store or the reward granter.
#[derive(Debug, Error, PartialEq)]
pub enum PersistenceError {
    #[error("failed to load user data for {user_id}: {reason}")]
    Load { user_id: String, reason: String },
    #[error("failed to write user data for {user_id}: {reason}")]
    Write { user_id: String, reason: String },
    #[error("failed to grant rewards for {challenge_id}: {reason}")]
    Reward { challenge_id: String, reason: String },
}

/// Raised by a state-machine evaluator for a single challenge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("state machine evaluation failed: {message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: usize,
        value: usize,
    },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("config is malformed: {0}")]
    Malformed(String),
}
