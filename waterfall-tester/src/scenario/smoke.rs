use anyhow::{Result, ensure};

use super::ScenarioCtx;
use super::fixtures::{self, V};

pub fn run(ctx: &ScenarioCtx) -> Result<()> {
    let service = fixtures::service(
        vec![
            fixtures::profile_kills("three-guards", 3),
            fixtures::global_kills("any-kill", 1),
        ],
        &ctx.config,
    )?;
    let mut session = fixtures::start(&service, "s1", "agent")?;
    ensure!(
        session.tracks("three-guards") && session.tracks("any-kill"),
        "session tracks {:?}",
        session.challenge_contexts.keys().collect::<Vec<_>>()
    );

    let first = service.process_event(&mut session, &fixtures::kill("guard"))?;
    ensure!(
        first.completed_ids() == ["any-kill"],
        "first kill completed {:?}",
        first.completed_ids()
    );
    ensure!(
        first.persisted_writes == 2,
        "expected profile progress and the global grant to be written, got {} writes",
        first.persisted_writes
    );

    service.process_event(&mut session, &fixtures::kill("civilian"))?;
    service.process_event(&mut session, &fixtures::kill("guard"))?;
    let third = service.process_event(&mut session, &fixtures::kill("guard"))?;
    ensure!(
        third.completed_ids().contains(&"three-guards"),
        "third guard kill completed {:?}",
        third.completed_ids()
    );

    let stored = fixtures::stored_user(&service, "agent")?;
    ensure!(stored.is_completed("three-guards"), "completion not persisted");
    ensure!(!stored.is_completed("any-kill"), "global challenge was marked completed");
    ensure!(
        service.rewards().total_mastery_xp("agent") == 1000,
        "mastery xp {}",
        service.rewards().total_mastery_xp("agent")
    );

    let unticked = service.take_unticked("agent", V)?;
    ensure!(unticked == ["three-guards"], "unticked {unticked:?}");
    ensure!(service.take_unticked("agent", V)?.is_empty(), "ticks were not saved");
    Ok(())
}
