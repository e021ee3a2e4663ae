//! Table-driven state machine used by scripted content and the scenario catalog.
//!
//! A machine is a JSON object of the form
//!
//! ```json
//! {"States": {"Start": {"Kill": [
//!     {"Match": {"RepoId": "guard"}, "Increment": "Count", "AtLeast": {"Count": 3}, "Transition": "Success"}
//! ]}}}
//! ```
//!
//! Handlers for the current state and event run in order. A handler whose
//! `Match` fails is skipped. `Increment` bumps a context counter. `AtLeast`
//! gates the transition on counters. The first handler that transitions ends the
//! evaluation. A handler carrying `Fail` raises an evaluation error instead.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use waterfall_engine::constants::{STATE_START, STATE_SUCCESS};
use waterfall_engine::{Evaluation, EvaluationError, EvaluationOptions, StateMachineEvaluator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MachineTable {
    #[serde(default)]
    pub states: IndexMap<String, IndexMap<String, Vec<Handler>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Handler {
    /// Event-value fields that must equal the given value, or one of the listed values.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub r#match: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub at_least: IndexMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
}

impl Handler {
    fn matches(&self, event_value: &Value) -> bool {
        self.r#match.iter().all(|(field, expected)| {
            let actual = &event_value[field.as_str()];
            match expected {
                Value::Array(allowed) => allowed.contains(actual),
                other => other == actual,
            }
        })
    }

    fn gate_open(&self, context: &Value) -> bool {
        self.at_least
            .iter()
            .all(|(counter, minimum)| counter_value(context, counter) >= *minimum)
    }
}

fn counter_value(context: &Value, counter: &str) -> i64 {
    context[counter].as_i64().unwrap_or(0)
}

/// Evaluates [`MachineTable`] machines. A `null` machine never changes state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableEvaluator;

impl TableEvaluator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StateMachineEvaluator for TableEvaluator {
    fn evaluate(
        &self,
        machine: &Value,
        mut context: Value,
        event_value: &Value,
        options: &EvaluationOptions<'_>,
    ) -> Result<Evaluation, EvaluationError> {
        if machine.is_null() {
            return Ok(Evaluation::new(options.current_state, context));
        }
        let table: MachineTable = serde_json::from_value(machine.clone())
            .map_err(|err| EvaluationError::new(format!("unreadable machine: {err}")))?;

        let handlers = table
            .states
            .get(options.current_state)
            .and_then(|events| events.get(options.event_name));
        let Some(handlers) = handlers else {
            return Ok(Evaluation::new(options.current_state, context));
        };

        for handler in handlers {
            if !handler.matches(event_value) {
                continue;
            }
            if let Some(message) = &handler.fail {
                return Err(EvaluationError::new(message.clone()));
            }
            if let Some(counter) = &handler.increment {
                if !context.is_object() {
                    context = json!({});
                }
                let next = counter_value(&context, counter) + 1;
                context[counter.as_str()] = json!(next);
            }
            if !handler.gate_open(&context) {
                continue;
            }
            if let Some(next) = &handler.transition {
                return Ok(Evaluation::new(next.as_str(), context));
            }
        }
        Ok(Evaluation::new(options.current_state, context))
    }
}

/// Machine that reaches `Success` after `target` `event_name` events matching `matcher`.
#[must_use]
pub fn counting_machine(event_name: &str, matcher: Value, target: i64) -> Value {
    let handler = json!({
        "Match": matcher,
        "Increment": "Count",
        "AtLeast": {"Count": target},
        "Transition": STATE_SUCCESS,
    });
    json!({"States": {STATE_START: {event_name: [handler]}}})
}

/// Machine that fails on every `event_name` event.
#[must_use]
pub fn failing_machine(event_name: &str, message: &str) -> Value {
    json!({"States": {STATE_START: {event_name: [{"Fail": message}]}}})
}
