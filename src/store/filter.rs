//! Row filters for store queries

use serde_json::Value;

/// Operator for filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,
}

impl FilterOperator {
    /// Convert the operator to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
        }
    }
}

/// A single `column <op> value` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl Condition {
    /// PostgREST query pair, e.g. `("status", "eq.pending")`
    pub fn to_param(&self) -> (String, String) {
        (
            self.column.clone(),
            format!("{}.{}", self.operator.as_str(), self.value),
        )
    }

    /// Evaluate against a JSON row. A missing column compares as null.
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(&self.column).map(value_text);
        match self.operator {
            FilterOperator::Eq => cell.as_deref() == Some(self.value.as_str()),
        }
    }
}

/// Conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: FilterOperator::Eq,
            value: value.to_string(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        self.conditions.iter().map(Condition::to_param).collect()
    }
}

/// Text form of a JSON cell as PostgREST would compare it
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
