//! Safety Validator
//!
//! Last gate before execution. Checks are textual and coarse on purpose: the
//! keyword denylist matches substrings, so an identifier such as
//! `customer_updated_at` is rejected along with a real `UPDATE`.

use crate::error::{Result, SafetyViolation};
use crate::models::{CompiledQuery, Parameters};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

const DISALLOWED_KEYWORDS: &[&str] = &["insert", "update", "delete", "drop", "alter", "truncate"];

lazy_static! {
    static ref LIMIT_PATTERN: Regex = Regex::new(r"limit\s+(\d+)").expect("limit pattern is valid");
}

/// A compiled query that passed every safety rule. Only the validator can
/// build one, so runners cannot be handed unchecked SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    query: CompiledQuery,
}

impl ValidatedQuery {
    pub fn sql(&self) -> &str {
        &self.query.sql
    }

    pub fn parameters(&self) -> &Parameters {
        &self.query.parameters
    }

    pub fn into_inner(self) -> CompiledQuery {
        self.query
    }
}

#[derive(Debug, Clone)]
pub struct SafetyValidator {
    max_limit: u64,
}

impl SafetyValidator {
    pub fn new(max_limit: u64) -> Self {
        Self { max_limit }
    }

    /// Check a statement and its parameters against the read-only contract.
    pub fn validate(&self, sql: &str, parameters: &Parameters) -> Result<()> {
        self.check(sql, parameters).map_err(|violation| {
            warn!(rule = %violation, "Rejected statement");
            violation.into()
        })
    }

    /// Validate and wrap a compiled query for execution.
    pub fn approve(&self, query: CompiledQuery) -> Result<ValidatedQuery> {
        self.validate(&query.sql, &query.parameters)?;
        Ok(ValidatedQuery { query })
    }

    fn check(&self, sql: &str, parameters: &Parameters) -> std::result::Result<(), SafetyViolation> {
        let lowered = sql.to_lowercase();

        if !lowered.trim_start().starts_with("select") {
            return Err(SafetyViolation::NotSelect);
        }

        if let Some(word) = DISALLOWED_KEYWORDS.iter().find(|w| lowered.contains(**w)) {
            return Err(SafetyViolation::DisallowedKeyword(word.to_string()));
        }

        if let Some(caps) = LIMIT_PATTERN.captures(&lowered) {
            // Digits too large for u64 are over any ceiling
            let limit = caps[1].parse::<u64>().unwrap_or(u64::MAX);
            if limit > self.max_limit {
                return Err(SafetyViolation::LimitExceeded {
                    limit,
                    max: self.max_limit,
                });
            }
        }

        if let Some(pos) = lowered.find(';') {
            if pos + 1 < lowered.len() {
                return Err(SafetyViolation::StatementStacking);
            }
        }

        for (name, value) in parameters {
            if parameter_text(value).contains(';') {
                return Err(SafetyViolation::ParameterInjection(name.clone()));
            }
        }

        Ok(())
    }
}

/// Textual form of a bound value; strings are taken without JSON quoting.
fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
