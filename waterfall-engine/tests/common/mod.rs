#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use waterfall_engine::constants::STATE_SUCCESS;
use waterfall_engine::{
    ChallengeCompleted, ChallengeDefinition, ChallengeGroup, ChallengeRegistry, CompletionHooks,
    ContextListener, ContractSession, CounterSource, EngineConfig, Evaluation, EvaluationError,
    EvaluationOptions, GameVersion, GameplayEvent, MemoryUserStore, ProgressEngine,
    RecordingRewards, UserDataStore, UserRecord,
};

pub const V: GameVersion = GameVersion::H3;
pub const LOCATION: &str = "LOC_TEST";
pub const GROUP: &str = "assassination";

pub type EvalFn =
    fn(&Value, Value, &Value, &EvaluationOptions<'_>) -> Result<Evaluation, EvaluationError>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts matching events until `Target`, then reports `Success`.
///
/// Machine shape: `{"Event": name, "Match": {field: value | [values]}, "Target": n}`.
/// `{"Fail": true}` makes every evaluation fail.
pub fn scripted_evaluator(
    machine: &Value,
    mut context: Value,
    event_value: &Value,
    options: &EvaluationOptions<'_>,
) -> Result<Evaluation, EvaluationError> {
    if machine["Fail"].as_bool() == Some(true) {
        return Err(EvaluationError::new("scripted failure"));
    }
    if options.current_state == STATE_SUCCESS
        || machine["Event"].as_str() != Some(options.event_name)
    {
        return Ok(Evaluation::new(options.current_state, context));
    }
    if let Some(rules) = machine["Match"].as_object() {
        for (field, expected) in rules {
            let actual = &event_value[field.as_str()];
            let matched = match expected {
                Value::Array(allowed) => allowed.contains(actual),
                other => other == actual,
            };
            if !matched {
                return Ok(Evaluation::new(options.current_state, context));
            }
        }
    }
    let count = context["Count"].as_i64().unwrap_or(0) + 1;
    context["Count"] = json!(count);
    let target = machine["Target"].as_i64().unwrap_or(1);
    let state = if count >= target { STATE_SUCCESS } else { "Counting" };
    Ok(Evaluation::new(state, context))
}

/// Completes after `target` kills of `repo_id`.
pub fn kills(id: &str, target: i64, repo_id: &str) -> ChallengeDefinition {
    let mut def = ChallengeDefinition::new(id);
    def.state_machine = json!({"Event": "Kill", "Match": {"RepoId": repo_id}, "Target": target});
    def.context = json!({"Count": 0});
    def
}

pub fn kill(repo_id: &str) -> GameplayEvent {
    GameplayEvent::new("Kill", json!({ "RepoId": repo_id }))
}

pub fn depends_on(mut def: ChallengeDefinition, deps: &[&str]) -> ChallengeDefinition {
    def.context_listeners.insert(
        "Tree".into(),
        ContextListener::ChallengeTree {
            required: deps.iter().map(|d| (*d).to_string()).collect(),
        },
    );
    def
}

pub fn with_counter(mut def: ChallengeDefinition, count: i64, total: i64) -> ChallengeDefinition {
    def.context["Count"] = json!(count);
    def.context_listeners.insert(
        "Counter".into(),
        ContextListener::ChallengeCounter {
            count: CounterSource::Path("$.Count".into()),
            total: CounterSource::Literal(total),
        },
    );
    def
}

/// Registry, backends and hooks wired the way an embedding server would.
pub struct Harness {
    pub registry: ChallengeRegistry,
    pub evaluator: EvalFn,
    pub store: MemoryUserStore,
    pub rewards: RecordingRewards,
    pub hooks: CompletionHooks,
    pub config: EngineConfig,
    pub fired: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new(definitions: Vec<ChallengeDefinition>) -> Self {
        init_logging();
        let mut registry = ChallengeRegistry::new(V);
        registry.register_group(ChallengeGroup::new(GROUP), LOCATION, V);
        for def in definitions {
            registry
                .register_challenge(def, GROUP, LOCATION, V)
                .expect("fixture content is valid");
        }

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let mut hooks = CompletionHooks::new();
        hooks.register(move |event: &ChallengeCompleted<'_>| -> anyhow::Result<()> {
            sink.lock().unwrap().push(event.definition.id.clone());
            Ok(())
        });

        Self {
            registry,
            evaluator: scripted_evaluator,
            store: MemoryUserStore::new(),
            rewards: RecordingRewards::new(),
            hooks,
            config: EngineConfig::default(),
            fired,
        }
    }

    pub fn engine(&self) -> ProgressEngine<'_> {
        ProgressEngine::new(
            &self.registry,
            &self.evaluator,
            &self.store,
            &self.rewards,
            &self.hooks,
            &self.config,
        )
    }

    pub fn user(&self) -> UserRecord {
        self.store.get_user_data("u1", V).unwrap()
    }

    /// Session tracking `ids`, in order, seeded from `user`.
    pub fn session(&self, user: &UserRecord, ids: &[&str]) -> ContractSession {
        let mut session = ContractSession::new("s1", "u1", V, "c1", LOCATION);
        for id in ids {
            let def = self.registry.get_challenge_by_id(id, V).unwrap();
            session.seed_challenge(def, user.progression(id));
        }
        session
    }

    pub fn fired(&self) -> Vec<String> {
        self.fired.lock().unwrap().clone()
    }
}
