//! Contract metadata consulted by the challenge filters.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ChallengeError;

/// The slice of a contract the filters need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContractInfo {
    pub id: String,
    #[serde(rename = "Type")]
    pub contract_type: String,
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_mode: Option<String>,
    /// Owning group contract (escalations, arcade runs), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Lookup of contracts by id, supplied by the content loader.
pub trait ContractDirectory {
    fn contract(&self, contract_id: &str) -> Option<ContractInfo>;
}

impl ContractDirectory for HashMap<String, ContractInfo> {
    fn contract(&self, contract_id: &str) -> Option<ContractInfo> {
        self.get(contract_id).cloned()
    }
}

impl ContractDirectory for [ContractInfo] {
    fn contract(&self, contract_id: &str) -> Option<ContractInfo> {
        self.iter().find(|c| c.id == contract_id).cloned()
    }
}

impl ContractDirectory for Vec<ContractInfo> {
    fn contract(&self, contract_id: &str) -> Option<ContractInfo> {
        self.as_slice().contract(contract_id)
    }
}

/// A contract together with the group contract it belongs to.
///
/// Stand-alone contracts are their own group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContract {
    pub contract: ContractInfo,
    pub group: ContractInfo,
}

impl ResolvedContract {
    /// Resolve a contract id and its group through a directory.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::UnknownContract` when the contract (or the group it
    /// names) is not in the directory.
    pub fn resolve<D>(directory: &D, contract_id: &str) -> Result<Self, ChallengeError>
    where
        D: ContractDirectory + ?Sized,
    {
        let contract = directory
            .contract(contract_id)
            .ok_or_else(|| ChallengeError::UnknownContract(contract_id.to_string()))?;
        let group = match contract.group_id.as_deref() {
            Some(group_id) if group_id != contract.id => directory
                .contract(group_id)
                .ok_or_else(|| ChallengeError::UnknownContract(group_id.to_string()))?,
            _ => contract.clone(),
        };
        Ok(Self { contract, group })
    }

    /// Pair a contract that is its own group.
    #[must_use]
    pub fn standalone(contract: ContractInfo) -> Self {
        Self {
            group: contract.clone(),
            contract,
        }
    }
}
