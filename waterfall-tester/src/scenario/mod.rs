//! Built-in property scenarios run against fixture content.
use anyhow::Result;
use waterfall_engine::EngineConfig;

pub mod cascade;
pub mod fixtures;
pub mod fuzz;
pub mod resilience;
pub mod smoke;

#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    /// Per-iteration seed.
    pub seed: u64,
    pub config: EngineConfig,
}

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    run: fn(&ScenarioCtx) -> Result<()>,
}

impl Scenario {
    /// # Errors
    ///
    /// Returns the first property the engine violated.
    pub fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        (self.run)(ctx)
    }
}

static CATALOG: [Scenario; 7] = [
    Scenario {
        name: "smoke",
        description: "Seed a session, count kills to completion, tick the result",
        run: smoke::run,
    },
    Scenario {
        name: "waterfall",
        description: "A challenge with two dependencies completes with the last one",
        run: cascade::waterfall,
    },
    Scenario {
        name: "chain",
        description: "A four-link dependency chain completes from a single event",
        run: cascade::chain,
    },
    Scenario {
        name: "repeatable",
        description: "Repeatable challenges reset and reward on every completion",
        run: cascade::repeatable,
    },
    Scenario {
        name: "fault-isolation",
        description: "A failing state machine does not stop other challenges",
        run: resilience::fault_isolation,
    },
    Scenario {
        name: "hot-reload",
        description: "Content reloads swap atomically and skip identical packs",
        run: resilience::hot_reload,
    },
    Scenario {
        name: "fuzz",
        description: "Seeded random content and events keep completion monotonic",
        run: fuzz::run,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    CATALOG.iter().map(|s| (s.name, s.description))
}

#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static Scenario> {
    CATALOG.iter().find(|s| s.name == name)
}

/// Resolve requested names; `all` expands to the whole catalog. Unknown names are
/// returned separately.
#[must_use]
pub fn expand_scenarios(requested: &[String]) -> (Vec<&'static Scenario>, Vec<String>) {
    let mut selected: Vec<&'static Scenario> = Vec::new();
    let mut unknown = Vec::new();
    for name in requested {
        if name == "all" {
            for scenario in &CATALOG {
                if !selected.iter().any(|s| s.name == scenario.name) {
                    selected.push(scenario);
                }
            }
            continue;
        }
        match find_scenario(name) {
            Some(scenario) => {
                if !selected.iter().any(|s| s.name == scenario.name) {
                    selected.push(scenario);
                }
            }
            None => unknown.push(name.clone()),
        }
    }
    (selected, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(seed: u64) -> ScenarioCtx {
        ScenarioCtx {
            seed,
            config: EngineConfig::default(),
        }
    }

    #[test]
    fn every_catalog_scenario_passes() {
        for scenario in &CATALOG {
            for seed in [1, 7, 1337] {
                if let Err(err) = scenario.run(&ctx(seed)) {
                    panic!("{} failed on seed {seed}: {err:#}", scenario.name);
                }
            }
        }
    }

    #[test]
    fn all_expands_without_duplicates() {
        let requested = vec!["smoke".to_string(), "all".to_string(), "nope".to_string()];
        let (selected, unknown) = expand_scenarios(&requested);
        assert_eq!(selected.len(), CATALOG.len());
        assert_eq!(selected[0].name, "smoke");
        assert_eq!(unknown, vec!["nope"]);
    }
}
