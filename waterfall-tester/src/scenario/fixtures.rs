//! Content and helpers shared by the built-in scenarios.
use anyhow::{Context, Result};
use serde_json::json;
use waterfall_engine::constants::TAG_GLOBAL;
use waterfall_engine::{
    ChallengeDefinition, ChallengeGroup, ChallengeRegistry, ChallengeScope, ChallengeType,
    ContentPack, ContextListener, ContractInfo, ContractSession, EngineConfig, GameVersion,
    GameplayEvent, GroupContent, LocationContent, SessionRequest, UserDataStore, UserRecord,
};

use crate::evaluator::counting_machine;
use crate::runner::{Service, build_service};

pub const V: GameVersion = GameVersion::H3;
pub const LOCATION: &str = "LOC_QA";
pub const PARENT_LOCATION: &str = "LOC_PARENT_QA";
pub const CATEGORY: &str = "assassination";
pub const GLOBAL_CATEGORY: &str = "general";
pub const CONTRACT: &str = "c-qa";

#[must_use]
pub fn contract() -> ContractInfo {
    ContractInfo {
        id: CONTRACT.into(),
        contract_type: "mission".into(),
        location_id: LOCATION.into(),
        game_mode: None,
        group_id: None,
    }
}

/// Parent-location challenge that counts `target` kills of `repo_id`.
#[must_use]
pub fn kills(id: &str, target: i64, repo_id: &str) -> ChallengeDefinition {
    let mut def = ChallengeDefinition::new(id);
    def.challenge_type = ChallengeType::ParentLocation;
    def.location_id = PARENT_LOCATION.into();
    def.parent_location_id = PARENT_LOCATION.into();
    def.state_machine = counting_machine("Kill", json!({ "RepoId": repo_id }), target);
    def.context = json!({"Count": 0});
    def.rewards.xp = 100;
    def
}

#[must_use]
pub fn profile_kills(id: &str, target: i64) -> ChallengeDefinition {
    let mut def = kills(id, target, "guard");
    def.scope = ChallengeScope::Profile;
    def.rewards.mastery_xp = 1000;
    def
}

/// Location-independent challenge, rewarded on every completion.
#[must_use]
pub fn global_kills(id: &str, target: i64) -> ChallengeDefinition {
    let mut def = ChallengeDefinition::new(id);
    def.challenge_type = ChallengeType::Global;
    def.tags.insert(TAG_GLOBAL.into());
    def.state_machine = counting_machine("Kill", json!({}), target);
    def.context = json!({"Count": 0});
    def
}

/// Challenge with no machine of its own, completed once every dependency is.
#[must_use]
pub fn combo(id: &str, dependencies: &[&str]) -> ChallengeDefinition {
    let mut def = ChallengeDefinition::new(id);
    def.challenge_type = ChallengeType::ParentLocation;
    def.location_id = PARENT_LOCATION.into();
    def.parent_location_id = PARENT_LOCATION.into();
    def.context_listeners.insert(
        "Tree".into(),
        ContextListener::ChallengeTree {
            required: dependencies.iter().map(|d| (*d).to_string()).collect(),
        },
    );
    def
}

#[must_use]
pub fn kill(repo_id: &str) -> GameplayEvent {
    GameplayEvent::new("Kill", json!({ "RepoId": repo_id }))
}

/// One pack: global-tagged challenges under `global_location`, the rest at the
/// parent of the contract location.
#[must_use]
pub fn pack(definitions: Vec<ChallengeDefinition>, global_location: &str) -> ContentPack {
    let (global, local): (Vec<_>, Vec<_>) = definitions
        .into_iter()
        .partition(|def| def.has_tag(TAG_GLOBAL));

    let mut pack = ContentPack::new(V);
    pack.locations.push(LocationContent {
        location_id: LOCATION.into(),
        parent_location_id: Some(PARENT_LOCATION.into()),
        groups: Vec::new(),
    });
    pack.locations.push(LocationContent {
        location_id: PARENT_LOCATION.into(),
        parent_location_id: None,
        groups: vec![GroupContent {
            group: ChallengeGroup::new(CATEGORY),
            challenges: local,
        }],
    });
    if !global.is_empty() {
        pack.locations.push(LocationContent {
            location_id: global_location.into(),
            parent_location_id: None,
            groups: vec![GroupContent {
                group: ChallengeGroup::new(GLOBAL_CATEGORY),
                challenges: global,
            }],
        });
    }
    pack
}

/// # Errors
///
/// Returns an error if the content is rejected by the registry.
pub fn registry(
    definitions: Vec<ChallengeDefinition>,
    config: &EngineConfig,
) -> Result<ChallengeRegistry> {
    let packs = [pack(definitions, &config.global_location)];
    ChallengeRegistry::from_packs(&packs, config.latest_version).context("fixture content rejected")
}

/// # Errors
///
/// Returns an error if the content or the config is rejected.
pub fn service(definitions: Vec<ChallengeDefinition>, config: &EngineConfig) -> Result<Service> {
    build_service(registry(definitions, config)?, config.clone())
}

/// # Errors
///
/// Returns an error if the session cannot be started.
pub fn start(service: &Service, session_id: &str, user_id: &str) -> Result<ContractSession> {
    service
        .start_session(
            &[contract()][..],
            SessionRequest::new(session_id, user_id, V, CONTRACT, 2),
        )
        .with_context(|| format!("starting {session_id} for {user_id}"))
}

/// Stored record for `user_id`, or an empty one if nothing was written yet.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn stored_user(service: &Service, user_id: &str) -> Result<UserRecord> {
    service
        .store()
        .get_user_data(user_id, V)
        .with_context(|| format!("loading {user_id}"))
}
