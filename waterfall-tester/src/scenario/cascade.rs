use anyhow::{Context, Result, ensure};
use waterfall_engine::constants::STATE_START;

use super::ScenarioCtx;
use super::fixtures;

pub fn waterfall(ctx: &ScenarioCtx) -> Result<()> {
    let service = fixtures::service(
        vec![
            fixtures::kills("a", 1, "a"),
            fixtures::kills("c", 1, "c"),
            fixtures::combo("b", &["a", "c"]),
        ],
        &ctx.config,
    )?;
    let mut session = fixtures::start(&service, "s1", "agent")?;

    let first = service.process_event(&mut session, &fixtures::kill("a"))?;
    ensure!(first.completed_ids() == ["a"], "after a: {:?}", first.completed_ids());
    ensure!(
        !fixtures::stored_user(&service, "agent")?.is_completed("b"),
        "b completed with c outstanding"
    );

    let second = service.process_event(&mut session, &fixtures::kill("c"))?;
    ensure!(
        second.completed_ids() == ["c", "b"],
        "after c: {:?}",
        second.completed_ids()
    );
    let via = second.completed[1].via_parent.as_deref();
    ensure!(via == Some("c"), "b cascaded via {via:?}");
    Ok(())
}

pub fn chain(ctx: &ScenarioCtx) -> Result<()> {
    let service = fixtures::service(
        vec![
            fixtures::kills("a", 1, "guard"),
            fixtures::combo("b", &["a"]),
            fixtures::combo("c", &["b"]),
            fixtures::combo("d", &["c"]),
        ],
        &ctx.config,
    )?;
    let mut session = fixtures::start(&service, "s1", "agent")?;

    let report = service.process_event(&mut session, &fixtures::kill("guard"))?;
    ensure!(
        report.completed_ids() == ["a", "b", "c", "d"],
        "chain completed {:?}",
        report.completed_ids()
    );
    let parents: Vec<Option<&str>> = report
        .completed
        .iter()
        .map(|record| record.via_parent.as_deref())
        .collect();
    ensure!(
        parents == [None, Some("a"), Some("b"), Some("c")],
        "chain parents {parents:?}"
    );
    ensure!(
        service.rewards().grants().len() == 4,
        "expected one grant per link"
    );
    Ok(())
}

pub fn repeatable(ctx: &ScenarioCtx) -> Result<()> {
    let mut repeat = fixtures::kills("repeat", 1, "guard");
    repeat.repeatable = true;
    let service = fixtures::service(vec![repeat], &ctx.config)?;
    let mut session = fixtures::start(&service, "s1", "agent")?;

    for round in 1..=3u32 {
        let report = service.process_event(&mut session, &fixtures::kill("guard"))?;
        ensure!(
            report.completed_ids() == ["repeat"],
            "round {round} completed {:?}",
            report.completed_ids()
        );
        let context = session.context("repeat").context("repeat is not tracked")?;
        ensure!(context.state == STATE_START, "round {round} left state {}", context.state);
        ensure!(
            context.times_completed == round,
            "round {round} counted {}",
            context.times_completed
        );
    }
    ensure!(
        service.rewards().grants().len() == 3,
        "expected a grant per completion"
    );
    Ok(())
}
