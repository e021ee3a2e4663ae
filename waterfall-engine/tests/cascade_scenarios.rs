mod common;

use common::{Harness, V, depends_on, kill, kills, with_counter};
use serde_json::json;
use waterfall_engine::constants::{STATE_START, STATE_SUCCESS, TAG_GLOBAL};
use waterfall_engine::{
    ChallengeDefinition, ChallengeError, ChallengeScope, ContentError, ContractSession,
    EngineConfig, PersistenceError, PersistentProgression, ProgressEngine, ProgressionGrant,
    RewardGranter, SessionChallengeContext, UserRecord,
};

#[test]
fn counter_challenge_completes_once_on_third_kill() {
    let harness = Harness::new(vec![kills("three-guards", 3, "guard")]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["three-guards"]);
    let engine = harness.engine();

    for _ in 0..2 {
        let report = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
        assert!(report.completed.is_empty());
    }
    assert_eq!(session.context("three-guards").unwrap().state, "Counting");

    let third = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
    assert_eq!(third.completed_ids(), vec!["three-guards"]);
    assert_eq!(third.completed[0].via_parent, None);

    let fourth = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
    assert!(fourth.completed.is_empty());
    assert_eq!(harness.fired(), vec!["three-guards"]);
    assert!(user.is_completed("three-guards"));
    assert_eq!(session.context("three-guards").unwrap().times_completed, 1);
}

#[test]
fn waterfall_waits_for_every_dependency() {
    let harness = Harness::new(vec![
        kills("a", 1, "a"),
        kills("c", 1, "c"),
        depends_on(ChallengeDefinition::new("b"), &["a", "c"]),
    ]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["a", "c", "b"]);
    let engine = harness.engine();

    let first = engine.process_event(&mut session, &mut user, &kill("a")).unwrap();
    assert_eq!(first.completed_ids(), vec!["a"]);
    assert!(!user.is_completed("b"));

    let second = engine.process_event(&mut session, &mut user, &kill("c")).unwrap();
    assert_eq!(second.completed_ids(), vec!["c", "b"]);
    assert_eq!(second.completed[1].via_parent.as_deref(), Some("c"));
    assert!(user.is_completed("b"));
    assert_eq!(harness.fired(), vec!["a", "c", "b"]);
}

#[test]
fn try_ignores_self_and_unrelated_parents() {
    let harness = Harness::new(vec![
        kills("a", 1, "a"),
        depends_on(ChallengeDefinition::new("b"), &["a"]),
    ]);
    let mut user = harness.user();
    user.mark_completed(harness.registry.get_challenge_by_id("a", V).unwrap());
    let mut session = harness.session(&user, &["b"]);
    let engine = harness.engine();

    for (challenge, parent) in [("b", "b"), ("a", "a"), ("b", "unrelated")] {
        let report = engine
            .try_to_complete_challenge(&mut session, &mut user, challenge, parent)
            .unwrap();
        assert!(report.completed.is_empty(), "{challenge} via {parent}");
    }
    assert!(!user.is_completed("b"));

    let report = engine
        .try_to_complete_challenge(&mut session, &mut user, "b", "a")
        .unwrap();
    assert_eq!(report.completed_ids(), vec!["b"]);
    assert_eq!(report.completed[0].via_parent.as_deref(), Some("a"));
}

#[test]
fn counter_decides_over_dependency_list() {
    let harness = Harness::new(vec![
        kills("x", 1, "x"),
        kills("y", 1, "y"),
        with_counter(depends_on(ChallengeDefinition::new("almost"), &["x", "y"]), 2, 3),
        with_counter(depends_on(ChallengeDefinition::new("fresh"), &["x", "y"]), 0, 3),
    ]);
    let engine = harness.engine();
    let x = harness.registry.get_challenge_by_id("x", V).unwrap();
    let y = harness.registry.get_challenge_by_id("y", V).unwrap();

    let mut partial = harness.user();
    partial.mark_completed(x);
    let mut session = harness.session(&partial, &[]);
    let report = engine
        .try_to_complete_challenge(&mut session, &mut partial, "almost", "x")
        .unwrap();
    assert_eq!(report.completed_ids(), vec!["almost"]);
    assert!(!partial.is_completed("y"));

    let mut everything = harness.user();
    everything.mark_completed(x);
    everything.mark_completed(y);
    let report = engine
        .try_to_complete_challenge(&mut session, &mut everything, "fresh", "y")
        .unwrap();
    assert!(report.completed.is_empty());
}

#[test]
fn chain_cascades_to_the_end_in_one_event() {
    let harness = Harness::new(vec![
        kills("a", 1, "guard"),
        depends_on(ChallengeDefinition::new("b"), &["a"]),
        depends_on(ChallengeDefinition::new("c"), &["b"]),
        depends_on(ChallengeDefinition::new("d"), &["c"]),
    ]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["a"]);

    let report = harness
        .engine()
        .process_event(&mut session, &mut user, &kill("guard"))
        .unwrap();
    assert_eq!(report.completed_ids(), vec!["a", "b", "c", "d"]);
    let parents: Vec<Option<&str>> = report
        .completed
        .iter()
        .map(|record| record.via_parent.as_deref())
        .collect();
    assert_eq!(parents, vec![None, Some("a"), Some("b"), Some("c")]);
    assert!(["a", "b", "c", "d"].iter().all(|id| user.is_completed(id)));
    assert_eq!(harness.rewards.grants().len(), 4);
}

#[test]
fn cascade_budget_aborts_the_event() {
    let mut harness = Harness::new(vec![
        kills("a", 1, "guard"),
        depends_on(ChallengeDefinition::new("b"), &["a"]),
    ]);
    harness.config = EngineConfig {
        max_cascade_steps: 3,
        ..EngineConfig::default()
    };
    let mut user = harness.user();
    let mut session = harness.session(&user, &["a"]);

    let err = harness
        .engine()
        .process_event(&mut session, &mut user, &kill("guard"))
        .unwrap_err();
    assert!(matches!(
        err,
        ChallengeError::Content(ContentError::CascadeLimit { limit: 3, .. })
    ));
}

#[test]
fn replayed_completion_can_finish_a_listening_challenge() {
    let mut combo = ChallengeDefinition::new("combo");
    combo.state_machine = json!({
        "Event": "ChallengeCompleted",
        "Match": {"ChallengeId": ["a", "b"]},
        "Target": 2
    });
    let harness = Harness::new(vec![kills("a", 1, "a"), kills("b", 1, "b"), combo]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["a", "b", "combo"]);
    let engine = harness.engine();

    engine.process_event(&mut session, &mut user, &kill("a")).unwrap();
    assert_eq!(session.context("combo").unwrap().context["Count"], 1);

    let report = engine.process_event(&mut session, &mut user, &kill("b")).unwrap();
    assert_eq!(report.completed_ids(), vec!["combo", "b"]);
    assert!(user.is_completed("combo"));
}

#[test]
fn evaluator_failure_is_isolated_to_one_challenge() {
    let mut broken = ChallengeDefinition::new("broken");
    broken.state_machine = json!({"Fail": true});
    let harness = Harness::new(vec![broken, kills("fine", 1, "guard")]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["broken", "fine"]);

    let report = harness
        .engine()
        .process_event(&mut session, &mut user, &kill("guard"))
        .unwrap();
    assert_eq!(report.completed_ids(), vec!["fine"]);
    assert!(!report.evaluation_failures.is_empty());
    assert!(
        report
            .evaluation_failures
            .iter()
            .all(|failure| failure.challenge_id == "broken")
    );
    assert_eq!(session.context("broken").unwrap().state, STATE_START);
}

#[test]
fn repeatable_challenge_resets_and_completion_stays_set() {
    let mut repeat = kills("repeat", 1, "guard");
    repeat.repeatable = true;
    let harness = Harness::new(vec![repeat]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["repeat"]);
    let engine = harness.engine();

    for round in 1..=3 {
        let report = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
        assert_eq!(report.completed_ids(), vec!["repeat"]);
        let context = session.context("repeat").unwrap();
        assert_eq!(context.state, STATE_START);
        assert_eq!(context.times_completed, round);
        assert!(user.is_completed("repeat"));
    }
    assert_eq!(harness.fired().len(), 3);
    assert_eq!(user.progression("repeat").unwrap().current_state, STATE_SUCCESS);
}

#[test]
fn profile_repeatable_challenge_completes_again_in_the_next_session() {
    let mut repeat = kills("repeat", 1, "guard");
    repeat.scope = ChallengeScope::Profile;
    repeat.repeatable = true;
    let harness = Harness::new(vec![repeat]);
    let mut user = harness.user();
    let engine = harness.engine();

    let mut first = harness.session(&user, &["repeat"]);
    for _ in 0..2 {
        let report = engine.process_event(&mut first, &mut user, &kill("guard")).unwrap();
        assert_eq!(report.completed_ids(), vec!["repeat"]);
    }

    let stored = harness.store.record("u1", V).unwrap();
    let mut second = harness.session(&stored, &["repeat"]);
    assert_eq!(second.context("repeat").unwrap().state, STATE_START);

    let mut user = stored;
    let report = engine.process_event(&mut second, &mut user, &kill("guard")).unwrap();
    assert_eq!(report.completed_ids(), vec!["repeat"]);
    assert_eq!(harness.fired().len(), 3);
    assert!(harness.store.record("u1", V).unwrap().is_completed("repeat"));
}

#[test]
fn global_challenges_are_rewarded_but_never_marked_completed() {
    let mut global = kills("any-kill", 1, "guard");
    global.tags.insert(TAG_GLOBAL.into());
    global.rewards.mastery_xp = 500;
    global.drops = vec!["PROP_TOOL_COIN".into()];
    let harness = Harness::new(vec![global]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["any-kill"]);

    let report = harness
        .engine()
        .process_event(&mut session, &mut user, &kill("guard"))
        .unwrap();
    assert_eq!(report.completed_ids(), vec!["any-kill"]);
    assert!(!user.is_completed("any-kill"));

    let grants = harness.rewards.grants();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].mastery_xp, 500);
    assert_eq!(grants[0].drops, vec!["PROP_TOOL_COIN"]);
    assert_eq!(grants[0].location_id, common::LOCATION);
}

/// Records each drop as a completed unlock on the user record.
struct UnlockingRewards;

impl RewardGranter for UnlockingRewards {
    fn grant_progression(
        &self,
        grant: &ProgressionGrant<'_>,
        _session: &ContractSession,
        user: &mut UserRecord,
    ) -> Result<(), PersistenceError> {
        for drop in grant.drops {
            user.challenge_progression.insert(
                format!("unlock:{drop}"),
                PersistentProgression {
                    completed: true,
                    ticked: false,
                    current_state: STATE_SUCCESS.into(),
                    state: json!({}),
                },
            );
        }
        Ok(())
    }
}

#[test]
fn reward_changes_are_written_for_global_completions() {
    let mut global = kills("any-kill", 1, "guard");
    global.tags.insert(TAG_GLOBAL.into());
    global.drops = vec!["PROP_TOOL_COIN".into()];
    let harness = Harness::new(vec![global]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["any-kill"]);
    let rewards = UnlockingRewards;
    let engine = ProgressEngine::new(
        &harness.registry,
        &harness.evaluator,
        &harness.store,
        &rewards,
        &harness.hooks,
        &harness.config,
    );

    let report = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
    assert_eq!(report.completed_ids(), vec!["any-kill"]);
    assert_eq!(report.persisted_writes, 1);

    let stored = harness.store.record("u1", V).unwrap();
    assert!(stored.is_completed("unlock:PROP_TOOL_COIN"));
    assert!(!stored.is_completed("any-kill"));
}

#[test]
fn profile_progress_is_written_and_write_failures_propagate() {
    let mut profile = kills("profile", 3, "guard");
    profile.scope = ChallengeScope::Profile;
    let harness = Harness::new(vec![profile]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["profile"]);
    let engine = harness.engine();

    let report = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
    assert_eq!(report.persisted_writes, 1);
    let stored = harness.store.record("u1", V).unwrap();
    assert_eq!(stored.progression("profile").unwrap().state, json!({"Count": 1}));

    harness.store.fail_writes(true);
    let err = engine
        .process_event(&mut session, &mut user, &kill("guard"))
        .unwrap_err();
    assert!(matches!(
        err,
        ChallengeError::Persistence(PersistenceError::Write { .. })
    ));
    assert_eq!(session.context("profile").unwrap().context, json!({"Count": 2}));
    assert_eq!(harness.store.write_count(), 1);
}

#[test]
fn unchanged_profile_progress_is_not_rewritten() {
    let mut profile = kills("profile", 3, "guard");
    profile.scope = ChallengeScope::Profile;
    let harness = Harness::new(vec![profile]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["profile"]);
    let engine = harness.engine();

    let first = engine.process_event(&mut session, &mut user, &kill("guard")).unwrap();
    assert_eq!(first.persisted_writes, 1);
    let ignored = engine.process_event(&mut session, &mut user, &kill("civilian")).unwrap();
    assert_eq!(ignored.persisted_writes, 0);
    assert_eq!(harness.store.write_count(), 1);
}

#[test]
fn unknown_tracked_challenge_fails_only_in_strict_mode() {
    let mut harness = Harness::new(vec![kills("real", 1, "guard")]);
    let mut user = harness.user();
    let mut session = harness.session(&user, &["real"]);
    session.challenge_contexts.insert(
        "ghost".into(),
        SessionChallengeContext::seeded(&ChallengeDefinition::new("ghost"), None),
    );

    let report = harness
        .engine()
        .process_event(&mut session, &mut user, &kill("other"))
        .unwrap();
    assert!(report.completed.is_empty());

    harness.config = EngineConfig {
        strict_content: true,
        ..EngineConfig::default()
    };
    let err = harness
        .engine()
        .process_event(&mut session, &mut user, &kill("other"))
        .unwrap_err();
    assert!(matches!(
        err,
        ChallengeError::Content(ContentError::UnknownChallenge { ref id, .. }) if id == "ghost"
    ));
}
