//! Unified error types for the raffle ledger.
//!
//! Errors fall into the groups callers need to tell apart: validation errors that are
//! raised before any transaction opens, conflicts (a ticket that is no longer available),
//! storage failures, and admin authentication denials.

use crate::auth::AuthError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Every failure the crate can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file or environment problem
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Storage I/O or driver failure
    #[error("Database error: {0}")]
    Database(DbErr),

    /// A unique or foreign key constraint rejected the write
    #[error("Constraint violation: {message}")]
    Constraint {
        /// Driver message for the violated constraint
        message: String,
    },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Amount or price that is not a positive finite number
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected value
        amount: f64,
    },

    /// Raffle type flag other than `terminal` or `triple`
    #[error("Unknown raffle type '{kind}' (expected 'terminal' or 'triple')")]
    InvalidRaffleType {
        /// The rejected flag
        kind: String,
    },

    /// Malformed input that is not an amount
    #[error("Invalid input: {message}")]
    Validation {
        /// Why the input was rejected
        message: String,
    },

    /// No raffle with this id
    #[error("Raffle {id} not found")]
    RaffleNotFound {
        /// Raffle id that was looked up
        id: i64,
    },

    /// No ticket matching the lookup
    #[error("Ticket {ticket} not found")]
    TicketNotFound {
        /// Ticket id or number that was looked up
        ticket: String,
    },

    /// The ticket is already reserved or paid
    #[error("Ticket {number} is not available")]
    TicketUnavailable {
        /// Display number of the ticket
        number: String,
    },

    /// Admin credential was rejected
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Outbound notification could not be delivered
    #[error("Notification error: {message}")]
    Notification {
        /// Delivery failure details
        message: String,
    },
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(
                SqlErr::UniqueConstraintViolation(message)
                | SqlErr::ForeignKeyConstraintViolation(message),
            ) => Self::Constraint { message },
            _ => Self::Database(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Notification {
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Input was rejected before any transaction was opened.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. } | Self::InvalidRaffleType { .. } | Self::Validation { .. }
        )
    }

    /// The operation lost against the current ticket state or a unique key.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::TicketUnavailable { .. } | Self::Constraint { .. })
    }

    /// The storage layer failed; the transaction was rolled back.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Constraint { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_predicates() {
        assert!(Error::InvalidAmount { amount: -1.0 }.is_validation());
        assert!(
            Error::TicketUnavailable {
                number: "07".to_string()
            }
            .is_conflict()
        );
        assert!(Error::Database(DbErr::Custom("boom".to_string())).is_storage());
        assert!(!Error::Auth(AuthError::Forbidden).is_storage());
    }

    #[test]
    fn test_custom_db_error_stays_database() {
        let err = Error::from(DbErr::Custom("disk full".to_string()));
        assert!(matches!(err, Error::Database(_)));
    }
}
