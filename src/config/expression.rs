//! Counter expressions embedded in task parameter strings.
//!
//! Parameter strings may carry `{...}` placeholders that read and update
//! named integer counters at execution time.
//!
//! # Syntax
//!
//! - `{name}` - current value of the counter (0 if never set)
//! - `{++name}` / `{--name}` - change the counter, then read it
//! - `{name++}` / `{name--}` - read the counter, then change it
//! - `{name+other}` - arithmetic (`+ - * /`) against another counter,
//!   skipped when `other` has never been set
//!
//! Braces that don't match this grammar are left verbatim, so JSON text
//! passes through untouched.
//!
//! # Example
//!
//! ```
//! use pipequeue::config::{CounterTable, ExpressionEvaluator};
//!
//! let counters = CounterTable::new();
//! counters.set("round", 5);
//! let evaluator = ExpressionEvaluator::new(counters.clone());
//!
//! assert_eq!(evaluator.evaluate("round {round++}"), "round 5");
//! assert_eq!(counters.get("round"), Some(6));
//! ```

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(\+\+|--)?(\w+)(\+\+|--)?([+\-*/]\w+)?\}")
        .expect("EXPRESSION must compile")
});

/// Shared table of named integer counters.
///
/// Clones share the same storage. Only one run uses the table at a time.
#[derive(Debug, Clone, Default)]
pub struct CounterTable {
    inner: Arc<Mutex<HashMap<String, i64>>>,
}

impl CounterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a counter, if it was ever set.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.lock().get(name).copied()
    }

    /// Set a counter.
    pub fn set(&self, name: &str, value: i64) {
        self.lock().insert(name.to_string(), value);
    }

    /// Forget every counter.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of counters that have been set.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no counter has been set.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> HashMap<String, i64> {
        self.lock().clone()
    }
}

#[derive(Debug, Error)]
enum ExpressionError {
    #[error("counter '{name}' overflowed")]
    Overflow { name: String },

    #[error("division by zero: '{name}' / '{operand}'")]
    DivisionByZero { name: String, operand: String },
}

/// Evaluates counter placeholders against a [`CounterTable`].
#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    counters: CounterTable,
}

impl ExpressionEvaluator {
    /// Create an evaluator over the given table.
    pub fn new(counters: CounterTable) -> Self {
        Self { counters }
    }

    /// The table this evaluator reads and writes.
    pub fn counters(&self) -> &CounterTable {
        &self.counters
    }

    /// Check if a string contains any placeholder.
    pub fn has_expression(text: &str) -> bool {
        EXPRESSION.is_match(text)
    }

    /// Replace every placeholder in `text` with its value.
    ///
    /// Counter updates are committed only when the whole string evaluates.
    /// On any failure the failure is logged, the table is left as it was,
    /// and `text` is returned unchanged.
    pub fn evaluate(&self, text: &str) -> String {
        if !Self::has_expression(text) {
            return text.to_string();
        }

        let mut table = self.counters.lock();
        let mut staged = table.clone();

        match substitute(text, &mut staged) {
            Ok(result) => {
                *table = staged;
                result
            }
            Err(e) => {
                warn!("Expression evaluation failed, keeping original text: {}", e);
                text.to_string()
            }
        }
    }
}

fn substitute(
    text: &str,
    counters: &mut HashMap<String, i64>,
) -> Result<String, ExpressionError> {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;

    for caps in EXPRESSION.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        result.push_str(&text[last..whole.start]);
        result.push_str(&evaluate_placeholder(&caps, counters)?.to_string());
        last = whole.end;
    }

    result.push_str(&text[last..]);
    Ok(result)
}

fn evaluate_placeholder(
    caps: &Captures<'_>,
    counters: &mut HashMap<String, i64>,
) -> Result<i64, ExpressionError> {
    let group = |i| caps.get(i).map_or("", |m| m.as_str());
    let (prefix, name, suffix, operation) = (group(1), group(2), group(3), group(4));

    let overflow = || ExpressionError::Overflow {
        name: name.to_string(),
    };

    let mut value = counters.get(name).copied().unwrap_or(0);

    if !prefix.is_empty() {
        let counter = counters.entry(name.to_string()).or_insert(0);
        *counter = step(*counter, prefix).ok_or_else(overflow)?;
        value = *counter;
    }

    if !suffix.is_empty() {
        let counter = counters.entry(name.to_string()).or_insert(0);
        value = *counter;
        *counter = step(*counter, suffix).ok_or_else(overflow)?;
    }

    if let Some((op, operand)) = split_operation(operation) {
        match counters.get(operand) {
            Some(&rhs) => {
                value = match op {
                    '+' => value.checked_add(rhs).ok_or_else(overflow)?,
                    '-' => value.checked_sub(rhs).ok_or_else(overflow)?,
                    '*' => value.checked_mul(rhs).ok_or_else(overflow)?,
                    '/' if rhs == 0 => {
                        return Err(ExpressionError::DivisionByZero {
                            name: name.to_string(),
                            operand: operand.to_string(),
                        })
                    }
                    '/' => value.checked_div(rhs).ok_or_else(overflow)?,
                    _ => value,
                }
            }
            None => {
                debug!("Counter '{}' is unset, skipping '{}'", operand, operation);
            }
        }
    }

    Ok(value)
}

fn step(value: i64, op: &str) -> Option<i64> {
    match op {
        "++" => value.checked_add(1),
        "--" => value.checked_sub(1),
        _ => Some(value),
    }
}

fn split_operation(operation: &str) -> Option<(char, &str)> {
    let mut chars = operation.chars();
    let op = chars.next()?;
    Some((op, chars.as_str()))
}
