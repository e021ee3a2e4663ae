//! In-memory user-data store and reward granter.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::definition::GameVersion;
use crate::error::PersistenceError;
use crate::progression::UserRecord;
use crate::session::ContractSession;
use crate::{ProgressionGrant, RewardGranter, UserDataStore};

/// User records held in a map; writes replace the stored record.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    records: Mutex<HashMap<(String, GameVersion), UserRecord>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, game_version: GameVersion, record: UserRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((record.user_id.clone(), game_version), record);
    }

    #[must_use]
    pub fn record(&self, user_id: &str, game_version: GameVersion) -> Option<UserRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(user_id.to_string(), game_version))
            .cloned()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Make every following write fail until switched off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl UserDataStore for MemoryUserStore {
    fn get_user_data(
        &self,
        user_id: &str,
        game_version: GameVersion,
    ) -> Result<UserRecord, PersistenceError> {
        Ok(self
            .record(user_id, game_version)
            .unwrap_or_else(|| UserRecord::new(user_id)))
    }

    fn write_user_data(
        &self,
        user_id: &str,
        game_version: GameVersion,
        record: &UserRecord,
    ) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(PersistenceError::Write {
                user_id: user_id.to_string(),
                reason: "store is rejecting writes".to_string(),
            });
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((user_id.to_string(), game_version), record.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// One recorded reward grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    pub user_id: String,
    pub challenge_id: String,
    pub xp: u32,
    pub mastery_xp: u32,
    pub drops: Vec<String>,
    pub location_id: String,
}

/// Reward granter that only remembers what it was asked to grant.
#[derive(Debug, Default)]
pub struct RecordingRewards {
    grants: Mutex<Vec<GrantRecord>>,
}

impl RecordingRewards {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grants(&self) -> Vec<GrantRecord> {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn total_mastery_xp(&self, user_id: &str) -> u64 {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|grant| grant.user_id == user_id)
            .map(|grant| u64::from(grant.mastery_xp))
            .sum()
    }
}

impl RewardGranter for RecordingRewards {
    fn grant_progression(
        &self,
        grant: &ProgressionGrant<'_>,
        session: &ContractSession,
        _user: &mut UserRecord,
    ) -> Result<(), PersistenceError> {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(GrantRecord {
                user_id: session.user_id.clone(),
                challenge_id: grant.challenge_id.to_string(),
                xp: grant.xp,
                mastery_xp: grant.mastery_xp,
                drops: grant.drops.to_vec(),
                location_id: grant.location_id.to_string(),
            });
        Ok(())
    }
}
