//! Shared state-machine plumbing for the approval workflows.
//!
//! Each workflow status is an enum implementing [`StateMachine`]; its `next` method is the
//! transition table. Anything not listed there is rejected with
//! [`Error::InvalidTransition`]. Statuses are persisted as their `as_str` form and parsed
//! back with [`StateMachine::from_stored`].

use crate::errors::{Error, Result};
use sea_orm::DbErr;
use std::fmt::Display;

/// A workflow status with an explicit transition table.
pub trait StateMachine: Copy + Eq + Display + Sized {
    /// Actions that drive the workflow
    type Action: Copy + Display;

    /// Workflow name used in error messages
    const WORKFLOW: &'static str;

    /// The transition table. `None` means the action is not allowed from `self`.
    fn next(self, action: Self::Action) -> Option<Self>;

    /// Whether no further transition is possible.
    fn is_terminal(self) -> bool;

    /// Stored string form.
    fn as_str(self) -> &'static str;

    /// Parses the stored string form.
    fn parse(value: &str) -> Option<Self>;

    /// Applies `action`, failing with [`Error::InvalidTransition`] if it is not in the table.
    fn apply(self, action: Self::Action) -> Result<Self> {
        self.next(action).ok_or_else(|| Error::InvalidTransition {
            workflow: Self::WORKFLOW,
            from: self.to_string(),
            action: action.to_string(),
        })
    }

    /// Parses a status read from the database. An unknown value means the row is corrupt.
    fn from_stored(value: &str) -> Result<Self> {
        Self::parse(value).ok_or_else(|| {
            Error::Database(DbErr::Custom(format!(
                "unknown {} status '{value}'",
                Self::WORKFLOW
            )))
        })
    }
}

/// Result of a bulk operation.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    /// Results for each requested id, in request order
    pub results: Vec<BulkItemResult>,
    /// Number of successful members
    pub success_count: usize,
    /// Number of failed members
    pub failure_count: usize,
}

/// Result for a single member of a bulk operation.
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    /// Record id
    pub id: i64,
    /// Whether the transition succeeded
    pub success: bool,
    /// Error message if it failed
    pub error: Option<String>,
}

impl BulkOutcome {
    /// Records the outcome for one member.
    pub fn record<T>(&mut self, id: i64, result: &Result<T>) {
        match result {
            Ok(_) => {
                self.success_count += 1;
                self.results.push(BulkItemResult {
                    id,
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                self.failure_count += 1;
                self.results.push(BulkItemResult {
                    id,
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }
}

/// Rejects empty or whitespace-only reasons.
pub(crate) fn require_reason(reason: &str) -> Result<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("a reason is required"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_outcome_counts() {
        let mut outcome = BulkOutcome::default();
        outcome.record(1, &Ok::<(), Error>(()));
        outcome.record(
            2,
            &Err::<(), Error>(Error::validation("bad bank details")),
        );
        outcome.record(3, &Ok::<(), Error>(()));

        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.results.len(), 3);
        assert!(!outcome.results[1].success);
        assert_eq!(
            outcome.results[1].error.as_deref(),
            Some("Validation failed: bad bank details")
        );
    }

    #[test]
    fn test_require_reason() {
        assert!(require_reason("   ").is_err());
        assert_eq!(require_reason(" blurry proof ").ok().as_deref(), Some("blurry proof"));
    }
}
