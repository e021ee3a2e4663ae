//! Derives dependency edges and counters from a challenge's context listeners.
//!
//! Extraction is pure and cheap. Counters live inside the context, so callers
//! re-run it whenever the context they care about changes.
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::definition::{ChallengeDefinition, ContextListener};

/// Running tally toward a fixed total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeCounter {
    pub count: i64,
    pub total: i64,
}

impl ChallengeCounter {
    /// Only counters with a positive total take part in completion checks.
    #[must_use]
    pub const fn is_active(self) -> bool {
        self.total > 0
    }

    /// Whether one more completion would reach the total.
    #[must_use]
    pub const fn within_one_of_total(self) -> bool {
        self.count >= self.total - 1
    }
}

/// What a challenge's completion depends on, as of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyInfo {
    pub dependency_challenge_ids: Vec<String>,
    pub counter: Option<ChallengeCounter>,
}

impl DependencyInfo {
    /// The counter, when it is active and therefore decides completion.
    #[must_use]
    pub fn active_counter(&self) -> Option<ChallengeCounter> {
        self.counter.filter(|c| c.is_active())
    }
}

/// Extract dependency ids and counter from a definition's listeners.
///
/// Tree listeners contribute their required ids in declaration order, duplicates
/// dropped. The first counter listener whose total resolves wins.
#[must_use]
pub fn extract_dependencies(definition: &ChallengeDefinition, context: &Value) -> DependencyInfo {
    let mut info = DependencyInfo::default();
    for listener in definition.context_listeners.values() {
        match listener {
            ContextListener::ChallengeTree { required } => {
                for id in required {
                    if !info.dependency_challenge_ids.contains(id) {
                        info.dependency_challenge_ids.push(id.clone());
                    }
                }
            }
            ContextListener::ChallengeCounter { count, total } => {
                if info.counter.is_some() {
                    continue;
                }
                if let Some(total) = total.resolve(context) {
                    info.counter = Some(ChallengeCounter {
                        count: count.resolve(context).unwrap_or(0),
                        total,
                    });
                }
            }
            ContextListener::Unsupported => {}
        }
    }
    info
}

/// Find the cycle that adding `id -> dependencies` would close in `tree`.
///
/// Returns the offending path starting and ending at `id`. Existing edges for
/// `id` are ignored since registration overwrites them.
#[must_use]
pub fn find_cycle(
    tree: &IndexMap<String, Vec<String>>,
    id: &str,
    dependencies: &[String],
) -> Option<Vec<String>> {
    let mut came_from: HashMap<&str, &str> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();

    for dep in dependencies {
        if seen.insert(dep.as_str()) {
            came_from.insert(dep.as_str(), id);
            stack.push(dep.as_str());
        }
    }

    while let Some(node) = stack.pop() {
        if node == id {
            return Some(rebuild_path(&came_from, id));
        }
        let Some(next) = tree.get(node) else {
            continue;
        };
        for dep in next {
            if seen.insert(dep.as_str()) {
                came_from.insert(dep.as_str(), node);
                stack.push(dep.as_str());
            }
        }
    }
    None
}

fn rebuild_path(came_from: &HashMap<&str, &str>, id: &str) -> Vec<String> {
    let mut path = vec![id.to_string()];
    let mut cursor = came_from.get(id).copied();
    while let Some(node) = cursor {
        path.push(node.to_string());
        if node == id {
            break;
        }
        cursor = came_from.get(node).copied();
    }
    path.reverse();
    path
}
