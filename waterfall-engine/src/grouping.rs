//! Category routing for challenge groups.
//!
//! Category ids are classified once when a group is registered. Resolution
//! then matches on the closed [`CategoryKind`] set, in this precedence:
//! feats, featured, arcade, escalation, classic, elusive, local.
use std::collections::BTreeSet;

use crate::constants::{
    CATEGORY_CLASSIC, CATEGORY_ELUSIVE, CATEGORY_FEATS, CATEGORY_MARKER_ARCADE,
    CATEGORY_MARKER_ESCALATION, CATEGORY_MARKER_FEATURED, GLOBAL_ARCADE_LOCATION,
    GLOBAL_CLASSIC_LOCATION, GLOBAL_ELUSIVE_LOCATION, GLOBAL_ESCALATION_LOCATION,
    GLOBAL_FEATURED_LOCATION,
};
use crate::definition::{ChallengeGroup, GameVersion};
use crate::registry::ChallengeRegistry;

/// Closed classification of category ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Feats,
    Featured,
    Arcade,
    Escalation,
    Classic,
    Elusive,
    Plain,
}

impl CategoryKind {
    /// Classify a category id. Patterns are checked in precedence order.
    #[must_use]
    pub fn parse(category_id: &str) -> Self {
        if category_id == CATEGORY_FEATS {
            Self::Feats
        } else if category_id.contains(CATEGORY_MARKER_FEATURED) {
            Self::Featured
        } else if category_id.contains(CATEGORY_MARKER_ARCADE) {
            Self::Arcade
        } else if category_id.contains(CATEGORY_MARKER_ESCALATION) {
            Self::Escalation
        } else if category_id == CATEGORY_CLASSIC {
            Self::Classic
        } else if category_id == CATEGORY_ELUSIVE {
            Self::Elusive
        } else {
            Self::Plain
        }
    }
}

/// Where a `(category, location)` lookup is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRoute {
    /// The group registered at the queried location.
    Local,
    /// Entirely from a global bucket, same category id.
    Global { location_id: &'static str },
    /// The local group merged with a group from a global bucket.
    Merge {
        location_id: &'static str,
        category_id: &'static str,
    },
}

impl GroupRoute {
    #[must_use]
    pub fn for_kind(
        kind: CategoryKind,
        location_id: &str,
        game_version: GameVersion,
        latest_version: GameVersion,
    ) -> Self {
        match kind {
            CategoryKind::Feats if game_version != latest_version => Self::Merge {
                location_id: GLOBAL_ESCALATION_LOCATION,
                category_id: CATEGORY_FEATS,
            },
            CategoryKind::Featured => Self::Global {
                location_id: GLOBAL_FEATURED_LOCATION,
            },
            CategoryKind::Arcade => Self::Global {
                location_id: GLOBAL_ARCADE_LOCATION,
            },
            CategoryKind::Escalation => Self::Global {
                location_id: GLOBAL_ESCALATION_LOCATION,
            },
            CategoryKind::Classic if location_id != GLOBAL_CLASSIC_LOCATION => Self::Merge {
                location_id: GLOBAL_CLASSIC_LOCATION,
                category_id: CATEGORY_CLASSIC,
            },
            CategoryKind::Elusive if location_id != GLOBAL_ELUSIVE_LOCATION => Self::Merge {
                location_id: GLOBAL_ELUSIVE_LOCATION,
                category_id: CATEGORY_ELUSIVE,
            },
            CategoryKind::Feats
            | CategoryKind::Classic
            | CategoryKind::Elusive
            | CategoryKind::Plain => Self::Local,
        }
    }
}

impl ChallengeRegistry {
    /// Route a category lookup at a location.
    #[must_use]
    pub fn route_group(
        &self,
        category_id: &str,
        location_id: &str,
        game_version: GameVersion,
    ) -> GroupRoute {
        GroupRoute::for_kind(
            self.category_kind(category_id),
            location_id,
            game_version,
            self.latest_version(),
        )
    }

    /// Resolve a group, applying category routing.
    ///
    /// Merged groups keep the local group's metadata and append the global
    /// bucket's ids that are not already present. A missing local group
    /// resolves to `None` rather than failing.
    #[must_use]
    pub fn get_group_by_id_loc(
        &self,
        category_id: &str,
        location_id: &str,
        game_version: GameVersion,
    ) -> Option<ChallengeGroup> {
        match self.route_group(category_id, location_id, game_version) {
            GroupRoute::Local => self
                .local_group(category_id, location_id, game_version)
                .cloned(),
            GroupRoute::Global {
                location_id: bucket,
            } => self.local_group(category_id, bucket, game_version).cloned(),
            GroupRoute::Merge {
                location_id: bucket,
                category_id: bucket_category,
            } => {
                let mut merged = self
                    .local_group(category_id, location_id, game_version)?
                    .clone();
                if let Some(global) = self.local_group(bucket_category, bucket, game_version) {
                    for id in &global.challenge_ids {
                        if !merged.challenge_ids.contains(id) {
                            merged.challenge_ids.push(id.clone());
                        }
                    }
                }
                Some(merged)
            }
        }
    }

    /// Resolve the registered challenge ids of a group, applying category routing.
    #[must_use]
    pub fn get_group_content_by_id_loc(
        &self,
        category_id: &str,
        location_id: &str,
        game_version: GameVersion,
    ) -> Option<BTreeSet<String>> {
        match self.route_group(category_id, location_id, game_version) {
            GroupRoute::Local => self
                .local_group_contents(category_id, location_id, game_version)
                .cloned(),
            GroupRoute::Global {
                location_id: bucket,
            } => self
                .local_group_contents(category_id, bucket, game_version)
                .cloned(),
            GroupRoute::Merge {
                location_id: bucket,
                category_id: bucket_category,
            } => {
                let mut merged = self
                    .local_group_contents(category_id, location_id, game_version)?
                    .clone();
                if let Some(global) =
                    self.local_group_contents(bucket_category, bucket, game_version)
                {
                    merged.extend(global.iter().cloned());
                }
                Some(merged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ChallengeDefinition;

    const V: GameVersion = GameVersion::H3;

    fn group(category: &str, ids: &[&str]) -> ChallengeGroup {
        ChallengeGroup {
            challenge_ids: ids.iter().map(|s| (*s).to_string()).collect(),
            ..ChallengeGroup::new(category)
        }
    }

    fn registry_with(entries: &[(&str, &str, &[&str])]) -> ChallengeRegistry {
        let mut registry = ChallengeRegistry::new(V);
        for (location, category, ids) in entries {
            registry.register_group(group(category, ids), location, V);
            registry.register_group(group(category, ids), location, GameVersion::H2);
            for id in *ids {
                for version in [V, GameVersion::H2] {
                    registry
                        .register_challenge(ChallengeDefinition::new(*id), category, location, version)
                        .unwrap();
                }
            }
        }
        registry
    }

    #[test]
    fn classification_follows_precedence() {
        assert_eq!(CategoryKind::parse("feats"), CategoryKind::Feats);
        assert_eq!(CategoryKind::parse("featured-arcade"), CategoryKind::Featured);
        assert_eq!(CategoryKind::parse("arcade-escalation"), CategoryKind::Arcade);
        assert_eq!(CategoryKind::parse("escalation"), CategoryKind::Escalation);
        assert_eq!(CategoryKind::parse("classic"), CategoryKind::Classic);
        assert_eq!(CategoryKind::parse("classics"), CategoryKind::Plain);
        assert_eq!(CategoryKind::parse("elusive"), CategoryKind::Elusive);
        assert_eq!(CategoryKind::parse("assassination"), CategoryKind::Plain);
    }

    #[test]
    fn feats_merge_only_on_older_versions() {
        let registry = registry_with(&[
            ("LOC_PARIS", "feats", &["paris-feat"]),
            (GLOBAL_ESCALATION_LOCATION, "feats", &["esc-feat"]),
        ]);

        let latest = registry
            .get_group_content_by_id_loc("feats", "LOC_PARIS", V)
            .unwrap();
        assert_eq!(latest.into_iter().collect::<Vec<_>>(), vec!["paris-feat"]);

        let older = registry
            .get_group_by_id_loc("feats", "LOC_PARIS", GameVersion::H2)
            .unwrap();
        assert_eq!(older.challenge_ids, vec!["paris-feat", "esc-feat"]);
    }

    #[test]
    fn global_buckets_replace_local_lookup() {
        let registry = registry_with(&[
            ("LOC_PARIS", "arcade", &["local-arcade"]),
            (GLOBAL_ARCADE_LOCATION, "arcade", &["global-arcade"]),
            (GLOBAL_FEATURED_LOCATION, "featured", &["featured-one"]),
        ]);

        let arcade = registry
            .get_group_content_by_id_loc("arcade", "LOC_PARIS", V)
            .unwrap();
        assert!(arcade.contains("global-arcade"));
        assert!(!arcade.contains("local-arcade"));

        let featured = registry
            .get_group_by_id_loc("featured", "LOC_ANYWHERE", V)
            .unwrap();
        assert_eq!(featured.challenge_ids, vec!["featured-one"]);
    }

    #[test]
    fn classic_merge_is_deterministic() {
        let registry = registry_with(&[
            ("LOC_PARIS", "classic", &["b-local", "a-local"]),
            (GLOBAL_CLASSIC_LOCATION, "classic", &["d-global", "c-global"]),
        ]);

        let first = registry
            .get_group_content_by_id_loc("classic", "LOC_PARIS", V)
            .unwrap();
        let second = registry
            .get_group_content_by_id_loc("classic", "LOC_PARIS", V)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.into_iter().collect::<Vec<_>>(),
            vec!["a-local", "b-local", "c-global", "d-global"]
        );

        let bucket_only = registry
            .get_group_content_by_id_loc("classic", GLOBAL_CLASSIC_LOCATION, V)
            .unwrap();
        assert_eq!(bucket_only.len(), 2);
    }

    #[test]
    fn merge_without_local_group_fails_safe() {
        let registry = registry_with(&[(GLOBAL_ELUSIVE_LOCATION, "elusive", &["et-1"])]);
        assert!(
            registry
                .get_group_content_by_id_loc("elusive", "LOC_PARIS", V)
                .is_none()
        );
        assert!(registry.get_group_by_id_loc("elusive", "LOC_PARIS", V).is_none());
    }
}
