//! Challenge content: definitions, groups and the declarative metadata attached to them.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeSet;

use crate::contract::ContractInfo;

/// Game release a piece of content belongs to. Registry data is partitioned by it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GameVersion {
    H1,
    H2,
    #[default]
    H3,
    Scpc,
}

impl std::fmt::Display for GameVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H1 => write!(f, "h1"),
            Self::H2 => write!(f, "h2"),
            Self::H3 => write!(f, "h3"),
            Self::Scpc => write!(f, "scpc"),
        }
    }
}

/// Where a challenge's progress lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeScope {
    /// Tracked for the current contract session only.
    #[default]
    Session,
    /// Persisted to the player's profile.
    Profile,
    /// Persisted, accumulated across hits.
    Hit,
}

impl ChallengeScope {
    /// Profile and hit scoped progress is mirrored into persistent progression.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Profile | Self::Hit)
    }
}

/// Content classification used by the location rules of the contract filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    #[default]
    Contract,
    Location,
    ParentLocation,
    Global,
}

impl ChallengeType {
    #[must_use]
    pub const fn is_location_bound(self) -> bool {
        matches!(self, Self::Location | Self::ParentLocation)
    }
}

/// Declarative applicability filter. Each present field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InclusionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_modes: Option<Vec<String>>,
}

impl InclusionData {
    /// True when every present field admits the contract.
    #[must_use]
    pub fn matches(&self, contract: &ContractInfo) -> bool {
        field_admits(self.contract_ids.as_deref(), Some(contract.id.as_str()))
            && field_admits(
                self.contract_types.as_deref(),
                Some(contract.contract_type.as_str()),
            )
            && field_admits(self.locations.as_deref(), Some(contract.location_id.as_str()))
            && field_admits(self.game_modes.as_deref(), contract.game_mode.as_deref())
    }

    /// Copy of this data with one contract type removed from `ContractTypes`.
    #[must_use]
    pub fn without_contract_type(&self, contract_type: &str) -> Self {
        let mut stripped = self.clone();
        if let Some(types) = stripped.contract_types.as_mut() {
            types.retain(|t| t != contract_type);
        }
        stripped
    }

    #[must_use]
    pub fn lists_contract(&self, contract_id: &str) -> bool {
        self.contract_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == contract_id))
    }

    #[must_use]
    pub fn lists_contract_type(&self, contract_type: &str) -> bool {
        self.contract_types
            .as_ref()
            .is_some_and(|types| types.iter().any(|t| t == contract_type))
    }
}

fn field_admits(field: Option<&[String]>, value: Option<&str>) -> bool {
    match field {
        None => true,
        Some(allowed) => value.is_some_and(|v| allowed.iter().any(|a| a == v)),
    }
}

/// Reference to a number inside a challenge context, or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterSource {
    Literal(i64),
    /// `$.Path.To.Field` into the context object.
    Path(String),
}

impl CounterSource {
    /// Resolve against a context; `None` when the path is absent or not numeric.
    #[must_use]
    pub fn resolve(&self, context: &Value) -> Option<i64> {
        match self {
            Self::Literal(value) => Some(*value),
            Self::Path(path) => {
                let trimmed = path.strip_prefix("$.").unwrap_or(path);
                let mut cursor = context;
                for segment in trimmed.split('.').filter(|s| !s.is_empty()) {
                    cursor = cursor.get(segment)?;
                }
                numeric(cursor)
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn numeric(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|v| i64::try_from(v).ok()))
        .or_else(|| value.as_f64().map(|v| v.trunc() as i64))
}

/// Listener metadata attached to a challenge context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContextListener {
    /// Running tally toward a fixed total.
    #[serde(rename = "challengecounter")]
    ChallengeCounter {
        count: CounterSource,
        total: CounterSource,
    },
    /// Progress depends on the completion of sibling challenges.
    #[serde(rename = "challengetree")]
    ChallengeTree {
        #[serde(default)]
        required: Vec<String>,
    },
    #[serde(other)]
    Unsupported,
}

/// Rewards granted on completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChallengeRewards {
    #[serde(default)]
    pub xp: u32,
    #[serde(default, rename = "MasteryXP")]
    pub mastery_xp: u32,
}

/// Difficulty levels a challenge is offered on; empty means every difficulty.
pub type DifficultyLevels = SmallVec<[u32; 4]>;

/// Immutable challenge content, keyed by game version and id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChallengeDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, rename = "Type")]
    pub challenge_type: ChallengeType,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub parent_location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_data: Option<InclusionData>,
    #[serde(default)]
    pub difficulty_levels: DifficultyLevels,
    #[serde(default)]
    pub scope: ChallengeScope,
    #[serde(default)]
    pub repeatable: bool,
    /// Opaque to the engine; handed to the evaluator untouched.
    #[serde(default)]
    pub state_machine: Value,
    /// Default context for fresh progress.
    #[serde(default = "empty_context")]
    pub context: Value,
    #[serde(default)]
    pub context_listeners: IndexMap<String, ContextListener>,
    #[serde(default)]
    pub rewards: ChallengeRewards,
    #[serde(default)]
    pub drops: Vec<String>,
}

fn empty_context() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ChallengeDefinition {
    /// Minimal session-scoped definition with an empty context.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            tags: BTreeSet::new(),
            challenge_type: ChallengeType::default(),
            group_id: String::new(),
            location_id: String::new(),
            parent_location_id: String::new(),
            inclusion_data: None,
            difficulty_levels: DifficultyLevels::new(),
            scope: ChallengeScope::default(),
            repeatable: false,
            state_machine: Value::Null,
            context: empty_context(),
            context_listeners: IndexMap::new(),
            rewards: ChallengeRewards::default(),
            drops: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Lowest difficulty the challenge is offered on, if restricted.
    #[must_use]
    pub fn lowest_difficulty(&self) -> Option<u32> {
        self.difficulty_levels.iter().copied().min()
    }
}

/// Named bucket of challenges shown together, indexed by location and category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChallengeGroup {
    pub category_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub challenge_ids: Vec<String>,
}

impl ChallengeGroup {
    #[must_use]
    pub fn new(category_id: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract(id: &str, contract_type: &str) -> ContractInfo {
        ContractInfo {
            id: id.into(),
            contract_type: contract_type.into(),
            location_id: "LOC_PARIS".into(),
            game_mode: None,
            group_id: None,
        }
    }

    #[test]
    fn definition_parses_from_content_json() {
        let def: ChallengeDefinition = serde_json::from_value(json!({
            "Id": "kill-five",
            "Tags": ["pro1", "hard"],
            "Type": "parentlocation",
            "Scope": "profile",
            "DifficultyLevels": [2, 1],
            "Context": {"Count": 0, "Total": 5},
            "ContextListeners": {
                "Count": {"type": "challengecounter", "count": "$.Count", "total": "$.Total"},
                "Weird": {"type": "somethingelse"}
            },
            "Rewards": {"MasteryXP": 2000}
        }))
        .unwrap();

        assert_eq!(def.challenge_type, ChallengeType::ParentLocation);
        assert!(def.scope.is_persistent());
        assert!(def.has_tag("pro1"));
        assert_eq!(def.lowest_difficulty(), Some(1));
        assert_eq!(def.rewards.mastery_xp, 2000);
        assert_eq!(
            def.context_listeners.get("Weird"),
            Some(&ContextListener::Unsupported)
        );
    }

    #[test]
    fn counter_source_walks_nested_paths() {
        let ctx = json!({"Progress": {"Kills": 4}, "Total": 6.0});
        assert_eq!(
            CounterSource::Path("$.Progress.Kills".into()).resolve(&ctx),
            Some(4)
        );
        assert_eq!(CounterSource::Path("$.Total".into()).resolve(&ctx), Some(6));
        assert_eq!(CounterSource::Path("$.Missing".into()).resolve(&ctx), None);
        assert_eq!(CounterSource::Literal(9).resolve(&ctx), Some(9));
    }

    #[test]
    fn inclusion_requires_every_present_field() {
        let data = InclusionData {
            contract_ids: None,
            contract_types: Some(vec!["mission".into(), "tutorial".into()]),
            locations: Some(vec!["LOC_PARIS".into()]),
            game_modes: None,
        };
        assert!(data.matches(&contract("c1", "mission")));
        assert!(!data.matches(&contract("c1", "sniper")));

        let stripped = data.without_contract_type("tutorial");
        assert!(!stripped.matches(&contract("c1", "tutorial")));
        assert!(InclusionData::default().matches(&contract("c1", "anything")));
    }

    #[test]
    fn game_mode_field_rejects_contracts_without_mode() {
        let data = InclusionData {
            game_modes: Some(vec!["versus".into()]),
            ..InclusionData::default()
        };
        assert!(!data.matches(&contract("c1", "mission")));
    }
}
