//! Versioned catalog of challenge definitions, groups and dependency edges.
//!
//! A registry is built once per content load and then only read. Hot reloads
//! build a fresh registry and swap it into a [`RegistryHandle`], so readers
//! always observe a complete catalog.
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::definition::{ChallengeDefinition, ChallengeGroup, GameVersion};
use crate::dependency::{extract_dependencies, find_cycle};
use crate::error::ContentError;
use crate::grouping::CategoryKind;

/// Location facts the filters consult besides challenge content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationPolicy {
    arcade_eta_locations: HashSet<String>,
    sniper_locations: HashSet<String>,
    parents: HashMap<String, String>,
}

impl LocationPolicy {
    /// Record that an arcade run appears in an elusive target at this location.
    pub fn link_arcade_eta(&mut self, location_id: impl Into<String>) {
        self.arcade_eta_locations.insert(location_id.into());
    }

    pub fn mark_sniper(&mut self, location_id: impl Into<String>) {
        self.sniper_locations.insert(location_id.into());
    }

    pub fn set_parent(&mut self, location_id: impl Into<String>, parent_id: impl Into<String>) {
        self.parents.insert(location_id.into(), parent_id.into());
    }

    /// Parent location of a sub-location, when one was declared.
    #[must_use]
    pub fn parent_of(&self, location_id: &str) -> Option<&str> {
        self.parents.get(location_id).map(String::as_str)
    }

    #[must_use]
    pub fn hosts_arcade_eta(&self, location_id: &str) -> bool {
        self.arcade_eta_locations.contains(location_id)
    }

    #[must_use]
    pub fn is_sniper(&self, location_id: &str) -> bool {
        self.sniper_locations.contains(location_id)
    }
}

/// Where a challenge was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    group_id: String,
    location_id: String,
}

type GroupIndex<T> = HashMap<String, HashMap<String, T>>;

#[derive(Debug, Clone, Default)]
struct VersionCatalog {
    challenges: IndexMap<String, ChallengeDefinition>,
    placements: HashMap<String, Placement>,
    dependency_tree: IndexMap<String, Vec<String>>,
    groups: GroupIndex<ChallengeGroup>,
    group_contents: GroupIndex<BTreeSet<String>>,
}

impl VersionCatalog {
    fn contents_mut(&mut self, location_id: &str, group_id: &str) -> &mut BTreeSet<String> {
        self.group_contents
            .entry(location_id.to_string())
            .or_default()
            .entry(group_id.to_string())
            .or_default()
    }

    fn unplace(&mut self, challenge_id: &str, placement: &Placement) -> bool {
        self.group_contents
            .get_mut(&placement.location_id)
            .and_then(|groups| groups.get_mut(&placement.group_id))
            .is_some_and(|ids| ids.remove(challenge_id))
    }
}

/// In-memory catalog keyed by game version.
#[derive(Debug, Clone, Default)]
pub struct ChallengeRegistry {
    versions: HashMap<GameVersion, VersionCatalog>,
    category_kinds: HashMap<String, CategoryKind>,
    locations: LocationPolicy,
    latest_version: GameVersion,
    content_digest: Option<String>,
}

impl ChallengeRegistry {
    #[must_use]
    pub fn new(latest_version: GameVersion) -> Self {
        Self {
            latest_version,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn latest_version(&self) -> GameVersion {
        self.latest_version
    }

    #[must_use]
    pub const fn locations(&self) -> &LocationPolicy {
        &self.locations
    }

    pub fn locations_mut(&mut self) -> &mut LocationPolicy {
        &mut self.locations
    }

    #[must_use]
    pub fn content_digest(&self) -> Option<&str> {
        self.content_digest.as_deref()
    }

    pub(crate) fn set_content_digest(&mut self, digest: String) {
        self.content_digest = Some(digest);
    }

    /// Register (or replace) a group at a location.
    ///
    /// Challenges listed in the group are indexed only once they are registered.
    pub fn register_group(
        &mut self,
        group: ChallengeGroup,
        location_id: &str,
        game_version: GameVersion,
    ) {
        self.category_kinds
            .entry(group.category_id.clone())
            .or_insert_with(|| CategoryKind::parse(&group.category_id));
        let catalog = self.versions.entry(game_version).or_default();
        catalog.contents_mut(location_id, &group.category_id);
        catalog
            .groups
            .entry(location_id.to_string())
            .or_default()
            .insert(group.category_id.clone(), group);
    }

    /// Register (or replace) a challenge inside a group at a location.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::SelfDependency` or `ContentError::DependencyCycle` when the
    /// challenge's dependency edges are invalid. The registry is left untouched.
    pub fn register_challenge(
        &mut self,
        mut definition: ChallengeDefinition,
        group_id: &str,
        location_id: &str,
        game_version: GameVersion,
    ) -> Result<(), ContentError> {
        let dependencies =
            extract_dependencies(&definition, &definition.context).dependency_challenge_ids;
        if dependencies.iter().any(|dep| *dep == definition.id) {
            return Err(ContentError::SelfDependency { id: definition.id });
        }

        let catalog = self.versions.entry(game_version).or_default();
        if let Some(path) = find_cycle(&catalog.dependency_tree, &definition.id, &dependencies) {
            return Err(ContentError::DependencyCycle { path });
        }

        let placement = Placement {
            group_id: group_id.to_string(),
            location_id: location_id.to_string(),
        };
        if let Some(previous) = catalog.placements.get(&definition.id).cloned()
            && previous != placement
        {
            catalog.unplace(&definition.id, &previous);
        }

        definition.group_id = group_id.to_string();
        let id = definition.id.clone();
        catalog.contents_mut(location_id, group_id).insert(id.clone());
        catalog.placements.insert(id.clone(), placement);
        catalog.dependency_tree.insert(id.clone(), dependencies);
        catalog.challenges.insert(id, definition);
        Ok(())
    }

    #[must_use]
    pub fn get_challenge_by_id(
        &self,
        challenge_id: &str,
        game_version: GameVersion,
    ) -> Option<&ChallengeDefinition> {
        self.versions
            .get(&game_version)
            .and_then(|catalog| catalog.challenges.get(challenge_id))
    }

    /// Every registered challenge id for a version, in registration order.
    #[must_use]
    pub fn get_challenge_ids(&self, game_version: GameVersion) -> Vec<&str> {
        self.versions
            .get(&game_version)
            .map(|catalog| catalog.challenges.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn challenge_count(&self, game_version: GameVersion) -> usize {
        self.versions
            .get(&game_version)
            .map_or(0, |catalog| catalog.challenges.len())
    }

    /// Remove a challenge from the flat map and the group index together.
    ///
    /// Returns false, changing nothing, when either entry is missing.
    pub fn remove_challenge(&mut self, challenge_id: &str, game_version: GameVersion) -> bool {
        let Some(catalog) = self.versions.get_mut(&game_version) else {
            return false;
        };
        let Some(placement) = catalog.placements.get(challenge_id).cloned() else {
            return false;
        };
        let indexed = catalog
            .group_contents
            .get(&placement.location_id)
            .and_then(|groups| groups.get(&placement.group_id))
            .is_some_and(|ids| ids.contains(challenge_id));
        if !indexed || !catalog.challenges.contains_key(challenge_id) {
            return false;
        }

        catalog.unplace(challenge_id, &placement);
        catalog.placements.remove(challenge_id);
        catalog.dependency_tree.shift_remove(challenge_id);
        catalog.challenges.shift_remove(challenge_id);
        true
    }

    /// Dependency edges recorded at registration; `None` when no entry exists.
    #[must_use]
    pub fn get_dependencies_for_challenge(
        &self,
        challenge_id: &str,
        game_version: GameVersion,
    ) -> Option<&[String]> {
        self.versions
            .get(&game_version)
            .and_then(|catalog| catalog.dependency_tree.get(challenge_id))
            .map(Vec::as_slice)
    }

    /// Challenges with at least one dependency, in registration order.
    pub fn dependent_challenge_ids(
        &self,
        game_version: GameVersion,
    ) -> impl Iterator<Item = &str> + '_ {
        self.versions
            .get(&game_version)
            .into_iter()
            .flat_map(|catalog| catalog.dependency_tree.iter())
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(id, _)| id.as_str())
    }

    /// Dependency edges pointing at challenges that are not registered.
    #[must_use]
    pub fn dangling_dependencies(&self, game_version: GameVersion) -> Vec<(String, String)> {
        let Some(catalog) = self.versions.get(&game_version) else {
            return Vec::new();
        };
        catalog
            .dependency_tree
            .iter()
            .flat_map(|(id, deps)| deps.iter().map(move |dep| (id, dep)))
            .filter(|(_, dep)| !catalog.challenges.contains_key(*dep))
            .map(|(id, dep)| (id.clone(), dep.clone()))
            .collect()
    }

    /// The group registered at exactly this location, with no category routing.
    #[must_use]
    pub fn local_group(
        &self,
        category_id: &str,
        location_id: &str,
        game_version: GameVersion,
    ) -> Option<&ChallengeGroup> {
        self.versions
            .get(&game_version)
            .and_then(|catalog| catalog.groups.get(location_id))
            .and_then(|groups| groups.get(category_id))
    }

    /// Indexed challenge ids of the group at exactly this location.
    #[must_use]
    pub fn local_group_contents(
        &self,
        category_id: &str,
        location_id: &str,
        game_version: GameVersion,
    ) -> Option<&BTreeSet<String>> {
        self.versions
            .get(&game_version)
            .and_then(|catalog| catalog.group_contents.get(location_id))
            .and_then(|groups| groups.get(category_id))
    }

    /// Category ids of every group registered at a location, sorted.
    #[must_use]
    pub fn categories_at(&self, location_id: &str, game_version: GameVersion) -> Vec<&str> {
        let mut categories: Vec<&str> = self
            .versions
            .get(&game_version)
            .and_then(|catalog| catalog.groups.get(location_id))
            .map(|groups| groups.keys().map(String::as_str).collect())
            .unwrap_or_default();
        categories.sort_unstable();
        categories
    }

    pub(crate) fn category_kind(&self, category_id: &str) -> CategoryKind {
        self.category_kinds
            .get(category_id)
            .copied()
            .unwrap_or_else(|| CategoryKind::parse(category_id))
    }
}

/// Shared, swappable registry reference.
///
/// Readers clone the inner `Arc` and keep using that snapshot for as long as
/// they need; a reload never mutates a registry someone is reading.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<ChallengeRegistry>>>,
}

impl RegistryHandle {
    #[must_use]
    pub fn new(registry: ChallengeRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Snapshot of the registry as of now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ChallengeRegistry> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a new registry, returning the one it replaced.
    pub fn replace(&self, registry: ChallengeRegistry) -> Arc<ChallengeRegistry> {
        let next = Arc::new(registry);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ContextListener;

    const V: GameVersion = GameVersion::H3;

    fn depends_on(id: &str, deps: &[&str]) -> ChallengeDefinition {
        let mut def = ChallengeDefinition::new(id);
        def.context_listeners.insert(
            "Tree".into(),
            ContextListener::ChallengeTree {
                required: deps.iter().map(|d| (*d).to_string()).collect(),
            },
        );
        def
    }

    #[test]
    fn registration_indexes_group_and_dependencies() {
        let mut registry = ChallengeRegistry::new(V);
        registry.register_group(ChallengeGroup::new("assassination"), "LOC_PARIS", V);
        registry
            .register_challenge(depends_on("parent", &["a", "b"]), "assassination", "LOC_PARIS", V)
            .unwrap();

        let def = registry.get_challenge_by_id("parent", V).unwrap();
        assert_eq!(def.group_id, "assassination");
        assert_eq!(
            registry.get_dependencies_for_challenge("parent", V),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        assert!(
            registry
                .local_group_contents("assassination", "LOC_PARIS", V)
                .unwrap()
                .contains("parent")
        );
        assert_eq!(
            registry.dangling_dependencies(V),
            vec![
                ("parent".to_string(), "a".to_string()),
                ("parent".to_string(), "b".to_string())
            ]
        );
        assert!(registry.get_challenge_by_id("parent", GameVersion::H2).is_none());
    }

    #[test]
    fn reregistration_overwrites_and_moves_group() {
        let mut registry = ChallengeRegistry::new(V);
        registry
            .register_challenge(ChallengeDefinition::new("c1"), "first", "LOC", V)
            .unwrap();
        let mut replacement = ChallengeDefinition::new("c1");
        replacement.name = "Renamed".into();
        registry
            .register_challenge(replacement, "second", "LOC", V)
            .unwrap();

        assert_eq!(registry.challenge_count(V), 1);
        assert_eq!(registry.get_challenge_by_id("c1", V).unwrap().name, "Renamed");
        assert!(registry.local_group_contents("first", "LOC", V).unwrap().is_empty());
        assert!(registry.local_group_contents("second", "LOC", V).unwrap().contains("c1"));
    }

    #[test]
    fn rejects_self_dependency_and_cycles() {
        let mut registry = ChallengeRegistry::new(V);
        assert_eq!(
            registry.register_challenge(depends_on("loop", &["loop"]), "g", "LOC", V),
            Err(ContentError::SelfDependency { id: "loop".into() })
        );

        registry
            .register_challenge(depends_on("a", &["b"]), "g", "LOC", V)
            .unwrap();
        let err = registry
            .register_challenge(depends_on("b", &["a"]), "g", "LOC", V)
            .unwrap_err();
        assert_eq!(
            err,
            ContentError::DependencyCycle {
                path: vec!["b".into(), "a".into(), "b".into()]
            }
        );
        assert!(registry.get_challenge_by_id("b", V).is_none());
    }

    #[test]
    fn remove_is_all_or_nothing() {
        let mut registry = ChallengeRegistry::new(V);
        registry
            .register_challenge(depends_on("c1", &["x"]), "g", "LOC", V)
            .unwrap();

        assert!(!registry.remove_challenge("missing", V));
        assert!(!registry.remove_challenge("c1", GameVersion::H1));
        assert!(registry.remove_challenge("c1", V));
        assert!(registry.get_challenge_by_id("c1", V).is_none());
        assert!(registry.get_dependencies_for_challenge("c1", V).is_none());
        assert!(!registry.remove_challenge("c1", V));
    }

    #[test]
    fn dependent_ids_skip_leaves() {
        let mut registry = ChallengeRegistry::new(V);
        for def in [
            ChallengeDefinition::new("leaf"),
            depends_on("mid", &["leaf"]),
            depends_on("top", &["mid"]),
        ] {
            registry.register_challenge(def, "g", "LOC", V).unwrap();
        }
        let dependents: Vec<&str> = registry.dependent_challenge_ids(V).collect();
        assert_eq!(dependents, vec!["mid", "top"]);
    }

    #[test]
    fn handle_swaps_whole_registry() {
        let handle = RegistryHandle::new(ChallengeRegistry::new(V));
        let before = handle.snapshot();

        let mut next = ChallengeRegistry::new(V);
        next.register_challenge(ChallengeDefinition::new("c1"), "g", "LOC", V)
            .unwrap();
        let previous = handle.replace(next);

        assert_eq!(before.challenge_count(V), 0);
        assert_eq!(previous.challenge_count(V), 0);
        assert_eq!(handle.snapshot().challenge_count(V), 1);
    }
}
