use anyhow::{Context, Result, ensure};
use waterfall_engine::constants::STATE_START;
use waterfall_engine::ReloadOutcome;

use super::ScenarioCtx;
use super::fixtures;
use crate::evaluator::failing_machine;

pub fn fault_isolation(ctx: &ScenarioCtx) -> Result<()> {
    let mut broken = fixtures::kills("broken", 1, "guard");
    broken.state_machine = failing_machine("Kill", "scripted failure");
    let service = fixtures::service(
        vec![broken, fixtures::kills("fine", 1, "guard")],
        &ctx.config,
    )?;
    let mut session = fixtures::start(&service, "s1", "agent")?;

    let report = service.process_event(&mut session, &fixtures::kill("guard"))?;
    ensure!(
        report.completed_ids() == ["fine"],
        "completed {:?}",
        report.completed_ids()
    );
    ensure!(
        !report.evaluation_failures.is_empty()
            && report
                .evaluation_failures
                .iter()
                .all(|failure| failure.challenge_id == "broken"),
        "failures {:?}",
        report.evaluation_failures
    );
    let broken_state = &session.context("broken").context("broken is not tracked")?.state;
    ensure!(broken_state == STATE_START, "broken moved to {broken_state}");
    Ok(())
}

pub fn hot_reload(ctx: &ScenarioCtx) -> Result<()> {
    let original = vec![fixtures::profile_kills("three-guards", 3)];
    let service = fixtures::service(original.clone(), &ctx.config)?;
    let mut old_session = fixtures::start(&service, "s1", "agent")?;

    let same = vec![fixtures::pack(original.clone(), &ctx.config.global_location)];
    let outcome = service.reload_content(&same)?;
    ensure!(outcome == ReloadOutcome::Unchanged, "identical reload gave {outcome:?}");

    let mut extended = original;
    extended.push(fixtures::kills("new-target", 1, "target"));
    let changed = vec![fixtures::pack(extended, &ctx.config.global_location)];
    let outcome = service.reload_content(&changed)?;
    ensure!(
        outcome == ReloadOutcome::Swapped { challenges: 2 },
        "changed reload gave {outcome:?}"
    );

    let new_session = fixtures::start(&service, "s2", "agent")?;
    ensure!(new_session.tracks("new-target"), "new session misses new content");
    ensure!(!old_session.tracks("new-target"), "old session picked up new content");

    service
        .process_event(&mut old_session, &fixtures::kill("guard"))
        .context("old session stopped working after reload")?;

    let looped = fixtures::combo("loop", &["loop"]);
    let rejected = vec![fixtures::pack(vec![looped], &ctx.config.global_location)];
    ensure!(
        service.reload_content(&rejected).is_err(),
        "self-dependent content was accepted"
    );
    ensure!(
        service.registry().snapshot().get_challenge_by_id("new-target", fixtures::V).is_some(),
        "failed reload replaced the registry"
    );
    Ok(())
}
