use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use waterfall_engine::{ContractInfo, GameVersion, GameplayEvent, Pro1Filter, SessionRequest};

/// Recorded sessions to replay against loaded content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventScript {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contracts: Vec<ContractInfo>,
    #[serde(default)]
    pub sessions: Vec<ScriptedSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptedSession {
    pub session_id: String,
    pub user_id: String,
    pub contract_id: String,
    #[serde(default)]
    pub game_version: GameVersion,
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default)]
    pub pro1_filter: Pro1Filter,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub events: Vec<GameplayEvent>,
    /// Challenges expected to complete during this session, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_completed: Option<Vec<String>>,
}

const fn default_difficulty() -> u32 {
    2
}

impl ScriptedSession {
    #[must_use]
    pub fn request(&self) -> SessionRequest {
        let mut request = SessionRequest::new(
            self.session_id.as_str(),
            self.user_id.as_str(),
            self.game_version,
            self.contract_id.as_str(),
            self.difficulty,
        );
        request.pro1_filter = self.pro1_filter;
        request.is_featured = self.is_featured;
        request
    }
}

impl EventScript {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid script.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        let mut script: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse script {}", path.display()))?;
        if script.name.is_empty() {
            script.name = path
                .file_stem()
                .map_or_else(|| "script".to_string(), |stem| stem.to_string_lossy().into_owned());
        }
        Ok(script)
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.sessions.iter().map(|session| session.events.len()).sum()
    }
}
