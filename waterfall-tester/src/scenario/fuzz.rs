//! Random dependency graphs driven by random kill streams.
//!
//! After every event the stored record is checked: completions never disappear,
//! nothing completes twice, a cascaded completion names one of its own
//! dependencies as parent, and every combo whose dependencies are all complete
//! is complete itself.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{Result, ensure};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use waterfall_engine::{ChallengeDefinition, ChallengeScope};

use super::ScenarioCtx;
use super::fixtures;

const TARGETS: usize = 4;
const EVENTS: usize = 40;

struct Graph {
    definitions: Vec<ChallengeDefinition>,
    /// Combo id to the ids it waits on.
    dependencies: BTreeMap<String, Vec<String>>,
}

fn random_graph(rng: &mut ChaCha8Rng) -> Graph {
    let mut definitions = Vec::new();
    let mut pool: Vec<String> = Vec::new();

    for i in 0..rng.gen_range(3..=6) {
        let id = format!("leaf-{i}");
        let target = format!("t{}", rng.gen_range(0..TARGETS));
        let mut def = fixtures::kills(&id, rng.gen_range(1..=3), &target);
        if rng.gen_bool(0.5) {
            def.scope = ChallengeScope::Profile;
        }
        definitions.push(def);
        pool.push(id);
    }

    let mut dependencies = BTreeMap::new();
    for j in 0..rng.gen_range(2..=5) {
        let id = format!("combo-{j}");
        let wanted = rng.gen_range(1..=3usize).min(pool.len());
        let chosen: Vec<String> = pool.choose_multiple(rng, wanted).cloned().collect();
        let borrowed: Vec<&str> = chosen.iter().map(String::as_str).collect();
        definitions.push(fixtures::combo(&id, &borrowed));
        dependencies.insert(id.clone(), chosen);
        pool.push(id);
    }

    Graph {
        definitions,
        dependencies,
    }
}

pub fn run(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
    let graph = random_graph(&mut rng);
    let service = fixtures::service(graph.definitions, &ctx.config)?;
    let mut session = fixtures::start(&service, "s1", "agent")?;

    let mut completed_before: BTreeSet<String> = BTreeSet::new();
    let mut ever_completed: HashSet<String> = HashSet::new();

    for step in 0..EVENTS {
        let target = format!("t{}", rng.gen_range(0..TARGETS));
        let report = service.process_event(&mut session, &fixtures::kill(&target))?;
        ensure!(
            report.evaluation_failures.is_empty(),
            "event {step}: evaluator failures {:?}",
            report.evaluation_failures
        );

        for record in &report.completed {
            ensure!(
                ever_completed.insert(record.challenge_id.clone()),
                "event {step}: {} completed twice",
                record.challenge_id
            );
            if let Some(parent) = &record.via_parent {
                let waits_on = graph
                    .dependencies
                    .get(&record.challenge_id)
                    .is_some_and(|deps| deps.contains(parent));
                ensure!(
                    waits_on,
                    "event {step}: {} cascaded from unrelated {parent}",
                    record.challenge_id
                );
            }
        }

        let user = fixtures::stored_user(&service, "agent")?;
        let completed: BTreeSet<String> = user
            .challenge_progression
            .iter()
            .filter(|(_, progression)| progression.completed)
            .map(|(id, _)| id.clone())
            .collect();
        ensure!(
            completed.is_superset(&completed_before),
            "event {step}: completions lost {:?}",
            completed_before.difference(&completed).collect::<Vec<_>>()
        );

        for (combo, deps) in &graph.dependencies {
            if deps.iter().all(|dep| completed.contains(dep)) {
                ensure!(
                    completed.contains(combo),
                    "event {step}: {combo} incomplete although {deps:?} are done"
                );
            }
        }
        completed_before = completed;
    }
    Ok(())
}
