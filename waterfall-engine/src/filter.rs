//! Applicability predicates: which challenges apply to a contract or location.
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTRACT_TYPE_ELUSIVE, CONTRACT_TYPE_TUTORIAL, TAG_ARCADE, TAG_ELUSIVE, TAG_ESCALATION,
    TAG_GLOBAL, TAG_PRO1,
};
use crate::contract::ResolvedContract;
use crate::definition::ChallengeDefinition;
use crate::registry::LocationPolicy;

/// How `pro1` tagged challenges are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pro1Filter {
    #[default]
    Include,
    Exclude,
    Only,
}

impl Pro1Filter {
    #[must_use]
    pub fn admits(self, challenge: &ChallengeDefinition) -> bool {
        let is_pro1 = challenge.has_tag(TAG_PRO1);
        match self {
            Self::Include => true,
            Self::Exclude => !is_pro1,
            Self::Only => is_pro1,
        }
    }
}

/// Query for a single contract playthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractQuery {
    pub contract: ResolvedContract,
    pub location_id: String,
    pub difficulty: u32,
    pub pro1_filter: Pro1Filter,
    /// Featured contracts only carry contract-bound and global challenges.
    pub is_featured: bool,
}

/// Filter kinds accepted by [`filter_challenge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeFilter {
    None,
    Contract(ContractQuery),
    /// Career page: any of several contracts, difficulty ignored.
    Contracts {
        contracts: Vec<ResolvedContract>,
        location_id: String,
        pro1_filter: Pro1Filter,
    },
    ContractType {
        contract_type: String,
    },
    ParentLocation {
        parent_location_id: String,
        pro1_filter: Pro1Filter,
    },
}

/// Whether `challenge` applies under `filter`.
#[must_use]
pub fn filter_challenge(
    filter: &ChallengeFilter,
    challenge: &ChallengeDefinition,
    locations: &LocationPolicy,
) -> bool {
    match filter {
        ChallengeFilter::None => true,
        ChallengeFilter::Contract(query) => {
            query.pro1_filter.admits(challenge)
                && difficulty_admits(challenge, query.difficulty)
                && matches_contract(
                    challenge,
                    &query.contract,
                    &query.location_id,
                    query.is_featured,
                    false,
                )
        }
        ChallengeFilter::Contracts {
            contracts,
            location_id,
            pro1_filter,
        } => {
            if !pro1_filter.admits(challenge) {
                return false;
            }
            contracts
                .iter()
                .any(|contract| matches_contract(challenge, contract, location_id, false, true))
                || (challenge.has_tag(TAG_ARCADE)
                    && challenge.has_tag(TAG_GLOBAL)
                    && locations.hosts_arcade_eta(location_id))
        }
        ChallengeFilter::ContractType { contract_type } => challenge
            .inclusion_data
            .as_ref()
            .is_some_and(|data| data.lists_contract_type(contract_type)),
        ChallengeFilter::ParentLocation {
            parent_location_id,
            pro1_filter,
        } => matches_parent_location(challenge, parent_location_id, *pro1_filter, locations),
    }
}

fn difficulty_admits(challenge: &ChallengeDefinition, difficulty: u32) -> bool {
    challenge
        .lowest_difficulty()
        .is_none_or(|lowest| lowest <= difficulty)
}

fn matches_contract(
    challenge: &ChallengeDefinition,
    contract: &ResolvedContract,
    location_id: &str,
    is_featured: bool,
    for_career: bool,
) -> bool {
    if challenge.has_tag(TAG_GLOBAL) {
        return challenge.inclusion_data.as_ref().is_none_or(|data| {
            if for_career {
                data.matches(&contract.group)
            } else {
                data.without_contract_type(CONTRACT_TYPE_TUTORIAL)
                    .matches(&contract.group)
            }
        });
    }

    if challenge.has_tag(TAG_ELUSIVE) && contract.group.contract_type != CONTRACT_TYPE_ELUSIVE {
        return false;
    }

    if let Some(data) = challenge.inclusion_data.as_ref()
        && (data.lists_contract(&contract.group.id)
            || data.lists_contract_type(&contract.contract.contract_type))
    {
        return true;
    }

    !is_featured
        && challenge.challenge_type.is_location_bound()
        && (challenge.location_id == location_id
            || challenge.location_id == challenge.parent_location_id)
}

fn matches_parent_location(
    challenge: &ChallengeDefinition,
    parent_location_id: &str,
    pro1_filter: Pro1Filter,
    locations: &LocationPolicy,
) -> bool {
    if challenge.has_tag(TAG_ELUSIVE) {
        return false;
    }
    if challenge.has_tag(TAG_ARCADE) {
        return challenge.parent_location_id == parent_location_id
            || (challenge.parent_location_id.is_empty()
                && locations.hosts_arcade_eta(parent_location_id));
    }
    if challenge.has_tag(TAG_ESCALATION) {
        return pro1_filter != Pro1Filter::Only && !locations.is_sniper(parent_location_id);
    }
    pro1_filter.admits(challenge)
}
