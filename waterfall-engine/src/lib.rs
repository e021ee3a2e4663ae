//! Waterfall Challenge Engine
//!
//! Tracks per-player challenge progress for a game server: a versioned registry
//! of challenge content, applicability filters, an event dispatcher that feeds
//! gameplay events to an external state-machine evaluator, and the completion
//! cascade that finishes challenges whose dependencies are now met.
//! Persistence and reward granting are supplied by the embedding server.

pub mod cascade;
pub mod config;
pub mod constants;
pub mod content;
pub mod contract;
pub mod definition;
pub mod dependency;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod grouping;
pub mod hooks;
pub mod memory;
pub mod progression;
pub mod registry;
pub mod session;
pub mod summary;

use std::collections::HashSet;

// Re-export commonly used types
pub use config::EngineConfig;
pub use content::{
    ContentPack, ContentSource, GroupContent, LocationContent, ReloadOutcome, content_digest,
};
pub use contract::{ContractDirectory, ContractInfo, ResolvedContract};
pub use definition::{
    ChallengeDefinition, ChallengeGroup, ChallengeRewards, ChallengeScope, ChallengeType,
    ContextListener, CounterSource, GameVersion, InclusionData,
};
pub use dependency::{ChallengeCounter, DependencyInfo, extract_dependencies};
pub use engine::{CompletionRecord, EvaluationFailure, EventReport, ProgressEngine};
pub use error::{ChallengeError, ConfigError, ContentError, EvaluationError, PersistenceError};
pub use evaluator::{Evaluation, EvaluationOptions, StateMachineEvaluator};
pub use filter::{ChallengeFilter, ContractQuery, Pro1Filter, filter_challenge};
pub use grouping::{CategoryKind, GroupRoute};
pub use hooks::{ChallengeCompleted, CompletionHooks, CompletionListener};
pub use memory::{GrantRecord, MemoryUserStore, RecordingRewards};
pub use progression::{PersistentProgression, UserRecord};
pub use registry::{ChallengeRegistry, LocationPolicy, RegistryHandle};
pub use session::{ContractSession, GameplayEvent, SessionChallengeContext, Timer};
pub use summary::{GroupProgress, group_progress, location_overview};

/// Durable storage of per-user progression.
///
/// Implementations must serialize access per user: the engine assumes it is
/// the only writer of a record for the duration of one event.
pub trait UserDataStore {
    /// Load a user's record, or an empty one for unknown users.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get_user_data(
        &self,
        user_id: &str,
        game_version: GameVersion,
    ) -> Result<UserRecord, PersistenceError>;

    /// Durably persist the in-memory record. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn write_user_data(
        &self,
        user_id: &str,
        game_version: GameVersion,
        record: &UserRecord,
    ) -> Result<(), PersistenceError>;
}

/// Rewards handed out when a challenge completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionGrant<'a> {
    pub challenge_id: &'a str,
    pub xp: u32,
    pub mastery_xp: u32,
    pub drops: &'a [String],
    pub location_id: &'a str,
}

impl<'a> ProgressionGrant<'a> {
    #[must_use]
    pub fn for_challenge(definition: &'a ChallengeDefinition, location_id: &'a str) -> Self {
        Self {
            challenge_id: &definition.id,
            xp: definition.rewards.xp,
            mastery_xp: definition.rewards.mastery_xp,
            drops: &definition.drops,
            location_id,
        }
    }
}

/// Inventory, XP and mastery bookkeeping owned by the embedding server.
pub trait RewardGranter {
    /// Apply one completion's rewards. Changes made to `user` are written by the
    /// engine right after this returns, global challenges included.
    ///
    /// # Errors
    ///
    /// Returns an error if the grant cannot be applied; the event fails with it.
    fn grant_progression(
        &self,
        grant: &ProgressionGrant<'_>,
        session: &ContractSession,
        user: &mut UserRecord,
    ) -> Result<(), PersistenceError>;
}

/// Parameters for [`ChallengeService::start_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub session_id: String,
    pub user_id: String,
    pub game_version: GameVersion,
    pub contract_id: String,
    pub difficulty: u32,
    pub pro1_filter: Pro1Filter,
    pub is_featured: bool,
}

impl SessionRequest {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        game_version: GameVersion,
        contract_id: impl Into<String>,
        difficulty: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            game_version,
            contract_id: contract_id.into(),
            difficulty,
            pro1_filter: Pro1Filter::default(),
            is_featured: false,
        }
    }
}

/// Main entry point for embedding servers
pub struct ChallengeService<E, S, R>
where
    E: StateMachineEvaluator,
    S: UserDataStore,
    R: RewardGranter,
{
    registry: RegistryHandle,
    evaluator: E,
    store: S,
    rewards: R,
    hooks: CompletionHooks,
    config: EngineConfig,
}

impl<E, S, R> ChallengeService<E, S, R>
where
    E: StateMachineEvaluator,
    S: UserDataStore,
    R: RewardGranter,
{
    /// # Errors
    ///
    /// Returns `ChallengeError::Config` when the configuration is invalid.
    pub fn new(
        registry: RegistryHandle,
        evaluator: E,
        store: S,
        rewards: R,
        config: EngineConfig,
    ) -> Result<Self, ChallengeError> {
        config.validate()?;
        Ok(Self {
            registry,
            evaluator,
            store,
            rewards,
            hooks: CompletionHooks::new(),
            config,
        })
    }

    pub fn register_listener(&mut self, listener: impl CompletionListener + 'static) {
        self.hooks.register(listener);
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn rewards(&self) -> &R {
        &self.rewards
    }

    /// Start a contract session seeded with every challenge that applies to it.
    ///
    /// Candidates come from the contract location, its parent location and the
    /// global location, with category routing applied per group.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::UnknownContract` if the contract cannot be resolved,
    /// or a persistence error if the user's record cannot be loaded.
    pub fn start_session<D>(
        &self,
        contracts: &D,
        request: SessionRequest,
    ) -> Result<ContractSession, ChallengeError>
    where
        D: ContractDirectory + ?Sized,
    {
        let resolved = ResolvedContract::resolve(contracts, &request.contract_id)?;
        let registry = self.registry.snapshot();
        let user = self.load_user(&request.user_id, request.game_version)?;
        let location_id = resolved.contract.location_id.clone();

        let filter = ChallengeFilter::Contract(ContractQuery {
            contract: resolved,
            location_id: location_id.clone(),
            difficulty: request.difficulty,
            pro1_filter: request.pro1_filter,
            is_featured: request.is_featured,
        });

        let mut session = ContractSession::new(
            request.session_id,
            request.user_id,
            request.game_version,
            request.contract_id,
            location_id.as_str(),
        );
        session.difficulty = request.difficulty;

        for challenge_id in self.session_candidates(&registry, &location_id, request.game_version) {
            let Some(definition) = registry.get_challenge_by_id(&challenge_id, request.game_version)
            else {
                continue;
            };
            if filter_challenge(&filter, definition, registry.locations()) {
                session.seed_challenge(definition, user.progression(&challenge_id));
            }
        }
        log::info!(
            "session {} started on {} with {} challenges",
            session.session_id,
            session.contract_id,
            session.challenge_contexts.len()
        );
        Ok(session)
    }

    fn session_candidates(
        &self,
        registry: &ChallengeRegistry,
        location_id: &str,
        game_version: GameVersion,
    ) -> Vec<String> {
        let mut locations = vec![location_id];
        if let Some(parent) = registry.locations().parent_of(location_id)
            && parent != location_id
        {
            locations.push(parent);
        }
        if !locations.contains(&self.config.global_location.as_str()) {
            locations.push(&self.config.global_location);
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for location in locations {
            for category in registry.categories_at(location, game_version) {
                let Some(contents) =
                    registry.get_group_content_by_id_loc(category, location, game_version)
                else {
                    continue;
                };
                for id in contents {
                    if seen.insert(id.clone()) {
                        candidates.push(id);
                    }
                }
            }
        }
        candidates
    }

    /// Process one gameplay event for a session.
    ///
    /// # Errors
    ///
    /// See [`ProgressEngine::process_event`].
    pub fn process_event(
        &self,
        session: &mut ContractSession,
        event: &GameplayEvent,
    ) -> Result<EventReport, ChallengeError> {
        let registry = self.registry.snapshot();
        let mut user = self.load_user(&session.user_id, session.game_version)?;
        self.engine(&registry)
            .process_event(session, &mut user, event)
    }

    /// # Errors
    ///
    /// See [`ProgressEngine::try_to_complete_challenge`].
    pub fn try_to_complete_challenge(
        &self,
        session: &mut ContractSession,
        challenge_id: &str,
        parent_id: &str,
    ) -> Result<EventReport, ChallengeError> {
        let registry = self.registry.snapshot();
        let mut user = self.load_user(&session.user_id, session.game_version)?;
        self.engine(&registry)
            .try_to_complete_challenge(session, &mut user, challenge_id, parent_id)
    }

    /// Reload content from a source and swap it in if it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or the content is invalid. The
    /// running registry is kept in either case.
    pub fn reload_content<C>(&self, source: &C) -> anyhow::Result<ReloadOutcome>
    where
        C: ContentSource,
    {
        let packs = source.load_packs()?;
        Ok(self.registry.reload(&packs, self.config.latest_version)?)
    }

    /// # Errors
    ///
    /// Returns a persistence error if the user's record cannot be loaded.
    pub fn group_progress(
        &self,
        user_id: &str,
        game_version: GameVersion,
        category_id: &str,
        location_id: &str,
    ) -> Result<GroupProgress, ChallengeError> {
        let user = self.load_user(user_id, game_version)?;
        Ok(group_progress(
            &self.registry.snapshot(),
            &user,
            category_id,
            location_id,
            game_version,
        ))
    }

    /// # Errors
    ///
    /// Returns a persistence error if the user's record cannot be loaded.
    pub fn location_overview(
        &self,
        user_id: &str,
        game_version: GameVersion,
        parent_location_id: &str,
        pro1_filter: Pro1Filter,
    ) -> Result<Vec<GroupProgress>, ChallengeError> {
        let user = self.load_user(user_id, game_version)?;
        Ok(location_overview(
            &self.registry.snapshot(),
            &user,
            parent_location_id,
            game_version,
            pro1_filter,
        ))
    }

    /// Completions the player has not been shown yet; they are marked ticked.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the record cannot be loaded or written.
    pub fn take_unticked(
        &self,
        user_id: &str,
        game_version: GameVersion,
    ) -> Result<Vec<String>, ChallengeError> {
        let mut user = self.load_user(user_id, game_version)?;
        let unticked = user.take_unticked();
        if !unticked.is_empty() {
            self.store.write_user_data(user_id, game_version, &user)?;
        }
        Ok(unticked)
    }

    fn load_user(
        &self,
        user_id: &str,
        game_version: GameVersion,
    ) -> Result<UserRecord, ChallengeError> {
        let mut user = self.store.get_user_data(user_id, game_version)?;
        let healed = user.heal_all();
        if healed > 0 {
            log::debug!("healed {healed} completed records for {user_id}");
        }
        Ok(user)
    }

    fn engine<'a>(&'a self, registry: &'a ChallengeRegistry) -> ProgressEngine<'a> {
        ProgressEngine::new(
            registry,
            &self.evaluator,
            &self.store,
            &self.rewards,
            &self.hooks,
            &self.config,
        )
    }
}
