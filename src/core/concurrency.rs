//! Optimistic concurrency helpers.
//!
//! Wallet and property rows carry a revision that every UPDATE checks; a mismatch surfaces
//! as [`Error::Conflict`]. Public operations wrap their database transaction in
//! [`retry_on_conflict`] so a lost race is retried once against fresh state.

use crate::errors::{Error, Result};
use sea_orm::{DbErr, SqlErr};
use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Runs `operation`, retrying it once if it fails with [`Error::Conflict`].
///
/// `operation` must start its own database transaction so the retry reads fresh rows.
pub async fn retry_on_conflict<T, F, Fut>(mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match operation().await {
        Err(Error::Conflict { message }) => {
            warn!("Retrying after concurrent modification: {message}");
            operation().await
        }
        other => other,
    }
}

/// Whether `err` is a UNIQUE constraint violation.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Builds the conflict error for a row whose revision moved underneath us.
pub(crate) fn conflict(what: impl Display) -> Error {
    Error::Conflict {
        message: format!("{what} was modified concurrently"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_retry_on_conflict_retries_once() {
        let attempts = Cell::new(0);
        let result: Result<u32> = retry_on_conflict(|| {
            attempts.set(attempts.get() + 1);
            let attempt = attempts.get();
            async move {
                if attempt == 1 {
                    Err(conflict("wallet alice"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn test_retry_on_conflict_surfaces_second_conflict() {
        let attempts = Cell::new(0);
        let result: Result<u32> = retry_on_conflict(|| {
            attempts.set(attempts.get() + 1);
            async { Err(conflict("wallet alice")) }
        })
        .await;

        assert!(matches!(result, Err(Error::Conflict { .. })));
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn test_retry_on_conflict_does_not_retry_other_errors() {
        let attempts = Cell::new(0);
        let result: Result<u32> = retry_on_conflict(|| {
            attempts.set(attempts.get() + 1);
            async { Err(Error::validation("nope")) }
        })
        .await;

        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(attempts.get(), 1);
    }
}
