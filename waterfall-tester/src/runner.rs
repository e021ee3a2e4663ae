use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use waterfall_engine::{
    ChallengeRegistry, ChallengeService, ContractInfo, EngineConfig, MemoryUserStore,
    RecordingRewards, RegistryHandle,
};

use crate::evaluator::TableEvaluator;
use crate::scenario::{Scenario, ScenarioCtx};
use crate::script::{EventScript, ScriptedSession};

pub type Service = ChallengeService<TableEvaluator, MemoryUserStore, RecordingRewards>;

/// Service over `registry` with in-memory backends.
///
/// # Errors
///
/// Returns an error if `config` is invalid.
pub fn build_service(registry: ChallengeRegistry, config: EngineConfig) -> Result<Service> {
    ChallengeService::new(
        RegistryHandle::new(registry),
        TableEvaluator::new(),
        MemoryUserStore::new(),
        RecordingRewards::new(),
        config,
    )
    .context("invalid engine configuration")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

impl ScenarioResult {
    fn from_runs(
        scenario_name: impl Into<String>,
        seed: u64,
        iterations: usize,
        failures: Vec<String>,
        performance_data: Vec<Duration>,
    ) -> Self {
        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };
        Self {
            scenario_name: scenario_name.into(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: performance_data.len(),
            failures,
            average_duration,
            performance_data,
        }
    }
}

/// Run every scenario for every seed. Scenario/seed pairs run in parallel.
///
/// # Errors
///
/// Returns an error if a worker task panics or is cancelled.
pub async fn run_catalog(
    scenarios: &[&'static Scenario],
    seeds: &[u64],
    iterations: usize,
    config: &EngineConfig,
    verbose: bool,
) -> Result<Vec<ScenarioResult>> {
    let mut tasks = JoinSet::new();
    let mut slot = 0usize;
    for scenario in scenarios {
        for &seed in seeds {
            let scenario: &'static Scenario = *scenario;
            let config = config.clone();
            let index = slot;
            slot += 1;
            tasks.spawn_blocking(move || {
                (index, run_scenario(scenario, seed, iterations, &config, verbose))
            });
        }
    }

    let mut results = Vec::with_capacity(slot);
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("scenario worker failed")?);
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

fn run_scenario(
    scenario: &Scenario,
    seed: u64,
    iterations: usize,
    config: &EngineConfig,
    verbose: bool,
) -> ScenarioResult {
    if verbose {
        println!(
            "🧪 Testing scenario: {} (seed: {seed})",
            scenario.name.bright_white()
        );
    }
    let mut failures = Vec::new();
    let mut performance_data = Vec::new();

    for i in 0..iterations {
        let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
        let ctx = ScenarioCtx {
            seed: iteration_seed,
            config: config.clone(),
        };
        let start_time = Instant::now();
        match scenario.run(&ctx) {
            Ok(()) => {
                let duration = start_time.elapsed();
                performance_data.push(duration);
                if verbose {
                    println!(
                        "  ✅ {} iteration {}/{iterations} passed ({duration:?})",
                        scenario.name,
                        i + 1
                    );
                }
            }
            Err(err) => {
                let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                if verbose {
                    println!("  ❌ {}", message.clone().red());
                }
                failures.push(message);
            }
        }
    }

    ScenarioResult::from_runs(scenario.name, seed, iterations, failures, performance_data)
}

/// What happened during one replayed session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub user_id: String,
    pub session_id: String,
    pub contract_id: String,
    pub events: usize,
    pub tracked: usize,
    pub completed: Vec<String>,
    pub evaluation_failures: usize,
    pub persisted_writes: usize,
    /// Engine errors and unmet expectations.
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Replay a script. Sessions of different users run in parallel; one user's
/// sessions run in script order so each sees the previous one's progress.
///
/// # Errors
///
/// Returns an error if a worker task panics or is cancelled.
pub async fn replay_script(
    service: Arc<Service>,
    script: Arc<EventScript>,
) -> Result<Vec<SessionOutcome>> {
    let mut by_user: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (index, session) in script.sessions.iter().enumerate() {
        by_user.entry(session.user_id.as_str()).or_default().push(index);
    }

    let mut tasks = JoinSet::new();
    for indices in by_user.into_values() {
        let service = Arc::clone(&service);
        let script = Arc::clone(&script);
        tasks.spawn_blocking(move || {
            indices
                .into_iter()
                .map(|index| {
                    let outcome =
                        replay_session(&service, &script.contracts, &script.sessions[index]);
                    (index, outcome)
                })
                .collect::<Vec<_>>()
        });
    }

    let mut outcomes = Vec::with_capacity(script.sessions.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.extend(joined.context("session worker failed")?);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

fn replay_session(
    service: &Service,
    contracts: &[ContractInfo],
    scripted: &ScriptedSession,
) -> SessionOutcome {
    let start_time = Instant::now();
    let mut outcome = SessionOutcome {
        user_id: scripted.user_id.clone(),
        session_id: scripted.session_id.clone(),
        contract_id: scripted.contract_id.clone(),
        ..SessionOutcome::default()
    };

    let mut session = match service.start_session(contracts, scripted.request()) {
        Ok(session) => session,
        Err(err) => {
            outcome.failures.push(format!("session did not start: {err}"));
            outcome.duration = start_time.elapsed();
            return outcome;
        }
    };
    outcome.tracked = session.challenge_contexts.len();

    for event in &scripted.events {
        outcome.events += 1;
        match service.process_event(&mut session, event) {
            Ok(report) => {
                outcome
                    .completed
                    .extend(report.completed.into_iter().map(|record| record.challenge_id));
                outcome.evaluation_failures += report.evaluation_failures.len();
                outcome.persisted_writes += report.persisted_writes;
            }
            Err(err) => {
                outcome
                    .failures
                    .push(format!("event {} ({}) failed: {err}", outcome.events, event.name));
                break;
            }
        }
    }

    if let Some(expected) = &scripted.expect_completed
        && *expected != outcome.completed
    {
        outcome.failures.push(format!(
            "expected completions {expected:?}, got {:?}",
            outcome.completed
        ));
    }
    outcome.duration = start_time.elapsed();
    outcome
}

/// Fold replayed sessions into a report row; each session counts as one iteration.
#[must_use]
pub fn script_result(name: &str, outcomes: &[SessionOutcome]) -> ScenarioResult {
    let failures = outcomes
        .iter()
        .flat_map(|outcome| {
            outcome
                .failures
                .iter()
                .map(move |failure| format!("{}/{}: {failure}", outcome.user_id, outcome.session_id))
        })
        .collect();
    let performance_data = outcomes
        .iter()
        .filter(|outcome| outcome.failures.is_empty())
        .map(|outcome| outcome.duration)
        .collect();
    ScenarioResult::from_runs(
        format!("script:{name}"),
        0,
        outcomes.len(),
        failures,
        performance_data,
    )
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
