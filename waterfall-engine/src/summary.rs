//! Completion counts for challenge listings.
use serde::Serialize;

use crate::definition::GameVersion;
use crate::filter::{ChallengeFilter, Pro1Filter, filter_challenge};
use crate::progression::UserRecord;
use crate::registry::ChallengeRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupProgress {
    pub category_id: String,
    pub name: String,
    pub completed: usize,
    pub total: usize,
    pub challenge_ids: Vec<String>,
}

impl GroupProgress {
    #[must_use]
    pub fn empty(category_id: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Progress through one category at one location. A missing group is empty.
#[must_use]
pub fn group_progress(
    registry: &ChallengeRegistry,
    user: &UserRecord,
    category_id: &str,
    location_id: &str,
    game_version: GameVersion,
) -> GroupProgress {
    summarize(registry, user, category_id, location_id, game_version, &ChallengeFilter::None)
}

/// Every category at a parent location, filtered by the parent-location rules.
///
/// Categories left without challenges are dropped.
#[must_use]
pub fn location_overview(
    registry: &ChallengeRegistry,
    user: &UserRecord,
    parent_location_id: &str,
    game_version: GameVersion,
    pro1_filter: Pro1Filter,
) -> Vec<GroupProgress> {
    let filter = ChallengeFilter::ParentLocation {
        parent_location_id: parent_location_id.to_string(),
        pro1_filter,
    };
    registry
        .categories_at(parent_location_id, game_version)
        .into_iter()
        .map(|category| {
            summarize(registry, user, category, parent_location_id, game_version, &filter)
        })
        .filter(|progress| progress.total > 0)
        .collect()
}

fn summarize(
    registry: &ChallengeRegistry,
    user: &UserRecord,
    category_id: &str,
    location_id: &str,
    game_version: GameVersion,
    filter: &ChallengeFilter,
) -> GroupProgress {
    let Some(group) = registry.get_group_by_id_loc(category_id, location_id, game_version) else {
        return GroupProgress::empty(category_id);
    };
    let challenge_ids: Vec<String> = group
        .challenge_ids
        .into_iter()
        .filter(|id| {
            registry
                .get_challenge_by_id(id, game_version)
                .is_some_and(|def| filter_challenge(filter, def, registry.locations()))
        })
        .collect();
    let completed = challenge_ids
        .iter()
        .filter(|id| user.is_completed(id))
        .count();
    GroupProgress {
        category_id: group.category_id,
        name: group.name,
        completed,
        total: challenge_ids.len(),
        challenge_ids,
    }
}
