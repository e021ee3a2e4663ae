//! Content packs and registry (re)loading.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::convert::Infallible;

use crate::definition::{ChallengeDefinition, ChallengeGroup, GameVersion};
use crate::error::ContentError;
use crate::registry::{ChallengeRegistry, RegistryHandle};

/// One game version's worth of challenge content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentPack {
    pub game_version: GameVersion,
    #[serde(default)]
    pub locations: Vec<LocationContent>,
    /// Parent locations where an arcade run shows up inside an elusive target.
    #[serde(default)]
    pub arcade_eta_locations: Vec<String>,
    /// Locations excluded from escalation listings.
    #[serde(default)]
    pub sniper_locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationContent {
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_location_id: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupContent {
    #[serde(flatten)]
    pub group: ChallengeGroup,
    #[serde(default)]
    pub challenges: Vec<ChallengeDefinition>,
}

impl ContentPack {
    #[must_use]
    pub fn new(game_version: GameVersion) -> Self {
        Self {
            game_version,
            locations: Vec::new(),
            arcade_eta_locations: Vec::new(),
            sniper_locations: Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `ContentError::Malformed` when the JSON does not describe a pack.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn challenge_count(&self) -> usize {
        self.locations
            .iter()
            .flat_map(|location| &location.groups)
            .map(|group| group.challenges.len())
            .sum()
    }
}

/// Where content packs come from.
pub trait ContentSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every pack the source currently holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the packs cannot be read or parsed.
    fn load_packs(&self) -> Result<Vec<ContentPack>, Self::Error>;
}

impl ContentSource for Vec<ContentPack> {
    type Error = Infallible;

    fn load_packs(&self) -> Result<Vec<ContentPack>, Self::Error> {
        Ok(self.clone())
    }
}

/// Hex SHA-256 over the serialized packs, in order.
///
/// # Errors
///
/// Returns `ContentError::Malformed` if a pack cannot be serialized.
pub fn content_digest(packs: &[ContentPack]) -> Result<String, ContentError> {
    let mut hasher = Sha256::new();
    for pack in packs {
        hasher.update(serde_json::to_vec(pack)?);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

impl ChallengeRegistry {
    /// Build a registry from packs: groups first, then their challenges.
    ///
    /// Groups without an explicit id list take the ids of their challenges.
    ///
    /// # Errors
    ///
    /// Returns the first registration error (self dependency or cycle).
    pub fn from_packs(
        packs: &[ContentPack],
        latest_version: GameVersion,
    ) -> Result<Self, ContentError> {
        let mut registry = Self::new(latest_version);
        for pack in packs {
            let version = pack.game_version;
            for location in &pack.locations {
                if let Some(parent) = location.parent_location_id.as_deref() {
                    registry
                        .locations_mut()
                        .set_parent(location.location_id.as_str(), parent);
                }
                for content in &location.groups {
                    let mut group = content.group.clone();
                    if group.challenge_ids.is_empty() {
                        group.challenge_ids = content.challenges.iter().map(|c| c.id.clone()).collect();
                    }
                    let category_id = group.category_id.clone();
                    registry.register_group(group, &location.location_id, version);
                    for definition in &content.challenges {
                        registry.register_challenge(
                            definition.clone(),
                            &category_id,
                            &location.location_id,
                            version,
                        )?;
                    }
                }
            }
            for location in &pack.arcade_eta_locations {
                registry.locations_mut().link_arcade_eta(location.as_str());
            }
            for location in &pack.sniper_locations {
                registry.locations_mut().mark_sniper(location.as_str());
            }
        }

        let versions: BTreeSet<GameVersion> = packs.iter().map(|p| p.game_version).collect();
        for version in versions {
            for (id, dependency) in registry.dangling_dependencies(version) {
                log::warn!("challenge {id} ({version}) depends on unknown challenge {dependency}");
            }
        }

        registry.set_content_digest(content_digest(packs)?);
        Ok(registry)
    }
}

/// Result of [`RegistryHandle::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReloadOutcome {
    Unchanged,
    Swapped { challenges: usize },
}

impl RegistryHandle {
    /// Rebuild from packs and swap atomically; identical content is not rebuilt.
    ///
    /// # Errors
    ///
    /// Returns the build error. The current registry stays in place.
    pub fn reload(
        &self,
        packs: &[ContentPack],
        latest_version: GameVersion,
    ) -> Result<ReloadOutcome, ContentError> {
        let digest = content_digest(packs)?;
        let current = self.snapshot();
        if current.content_digest() == Some(digest.as_str())
            && current.latest_version() == latest_version
        {
            log::debug!("content digest {digest} unchanged, skipping reload");
            return Ok(ReloadOutcome::Unchanged);
        }

        let registry = ChallengeRegistry::from_packs(packs, latest_version)?;
        let versions: BTreeSet<GameVersion> = packs.iter().map(|p| p.game_version).collect();
        let challenges: usize = versions
            .into_iter()
            .map(|version| registry.challenge_count(version))
            .sum();
        self.replace(registry);
        log::info!("challenge registry swapped: {challenges} challenges, digest {digest}");
        Ok(ReloadOutcome::Swapped { challenges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pack_json() -> serde_json::Value {
        json!({
            "GameVersion": "h3",
            "Locations": [{
                "LocationId": "LOC_PARIS",
                "ParentLocationId": "LOC_PARENT_PARIS",
                "Groups": [{
                    "CategoryId": "assassination",
                    "Name": "Assassinations",
                    "Challenges": [
                        {"Id": "kill-a"},
                        {
                            "Id": "all-kills",
                            "ContextListeners": {
                                "Tree": {"type": "challengetree", "required": ["kill-a", "kill-ghost"]}
                            }
                        }
                    ]
                }]
            }],
            "ArcadeEtaLocations": ["LOC_PARENT_PARIS"],
            "SniperLocations": ["LOC_SNIPER"]
        })
    }

    fn pack() -> ContentPack {
        serde_json::from_value(pack_json()).unwrap()
    }

    #[test]
    fn packs_populate_registry_and_location_facts() {
        let registry = ChallengeRegistry::from_packs(&[pack()], GameVersion::H3).unwrap();
        let v = GameVersion::H3;

        assert_eq!(registry.challenge_count(v), 2);
        let group = registry.local_group("assassination", "LOC_PARIS", v).unwrap();
        assert_eq!(group.name, "Assassinations");
        assert_eq!(group.challenge_ids, vec!["kill-a", "all-kills"]);
        assert_eq!(
            registry.get_dependencies_for_challenge("all-kills", v),
            Some(&["kill-a".to_string(), "kill-ghost".to_string()][..])
        );
        assert_eq!(registry.locations().parent_of("LOC_PARIS"), Some("LOC_PARENT_PARIS"));
        assert!(registry.locations().hosts_arcade_eta("LOC_PARENT_PARIS"));
        assert!(registry.locations().is_sniper("LOC_SNIPER"));
        assert_eq!(registry.content_digest().map(str::len), Some(64));
    }

    #[test]
    fn digest_is_stable_lowercase_hex() {
        let digest = content_digest(&[pack()]).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(content_digest(&[pack()]).unwrap(), digest);
        assert_ne!(content_digest(&[]).unwrap(), digest);
    }

    #[test]
    fn cyclic_pack_is_rejected() {
        let mut value = pack_json();
        value["Locations"][0]["Groups"][0]["Challenges"][0]["ContextListeners"] =
            json!({"Tree": {"type": "challengetree", "required": ["all-kills"]}});
        let pack: ContentPack = serde_json::from_value(value).unwrap();
        assert!(matches!(
            ChallengeRegistry::from_packs(&[pack], GameVersion::H3),
            Err(ContentError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn reload_skips_identical_content() {
        let handle = RegistryHandle::default();
        let packs = vec![pack()];
        assert_eq!(
            handle.reload(&packs, GameVersion::H3).unwrap(),
            ReloadOutcome::Swapped { challenges: 2 }
        );
        let first = handle.snapshot();
        assert_eq!(
            handle.reload(&packs, GameVersion::H3).unwrap(),
            ReloadOutcome::Unchanged
        );
        assert!(std::sync::Arc::ptr_eq(&first, &handle.snapshot()));

        let mut changed = pack();
        changed.locations[0].groups[0]
            .challenges
            .push(ChallengeDefinition::new("kill-b"));
        assert_eq!(
            handle.reload(&[changed], GameVersion::H3).unwrap(),
            ReloadOutcome::Swapped { challenges: 3 }
        );
    }

    #[test]
    fn malformed_json_is_a_content_error() {
        assert!(matches!(
            ContentPack::from_json("{\"Locations\": 3}"),
            Err(ContentError::Malformed(_))
        ));
        assert_eq!(pack().challenge_count(), 2);
    }
}
