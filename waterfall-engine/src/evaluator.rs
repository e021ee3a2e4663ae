//! Boundary to the external state-machine evaluator.
use serde_json::Value;

use crate::error::EvaluationError;
use crate::session::Timer;

/// Per-call inputs besides the machine, context and event value.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationOptions<'a> {
    pub event_name: &'a str,
    pub current_state: &'a str,
    pub timers: &'a [Timer],
    pub timestamp: f64,
    pub contract_id: &'a str,
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: String,
    /// `None` falls back to the definition's default context.
    pub context: Option<Value>,
    /// `None` leaves the stored timers untouched.
    pub timers: Option<Vec<Timer>>,
}

impl Evaluation {
    #[must_use]
    pub fn new(state: impl Into<String>, context: Value) -> Self {
        Self {
            state: state.into(),
            context: Some(context),
            timers: None,
        }
    }
}

/// Pure transition function over opaque machine definitions.
///
/// The context is handed over by value: evaluators work on their own copy and
/// never see engine-owned state.
pub trait StateMachineEvaluator {
    /// Evaluate one event against one challenge.
    ///
    /// # Errors
    ///
    /// Returns an `EvaluationError` when the machine cannot process the event.
    fn evaluate(
        &self,
        machine: &Value,
        context: Value,
        event_value: &Value,
        options: &EvaluationOptions<'_>,
    ) -> Result<Evaluation, EvaluationError>;
}

impl<F> StateMachineEvaluator for F
where
    F: Fn(&Value, Value, &Value, &EvaluationOptions<'_>) -> Result<Evaluation, EvaluationError>,
{
    fn evaluate(
        &self,
        machine: &Value,
        context: Value,
        event_value: &Value,
        options: &EvaluationOptions<'_>,
    ) -> Result<Evaluation, EvaluationError> {
        self(machine, context, event_value, options)
    }
}
