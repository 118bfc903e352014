//! Error types for the query service.
//!
//! The taxonomy mirrors how failures are handled:
//! - invalid requests and malformed tickets are surfaced before any store
//!   call is made
//! - store failures are wrapped with the operation that hit them
//! - cancellation is propagated unwrapped so callers can match on it
//!
//! Data inconsistencies (unparseable anchor spans, offsets that do not
//! normalize, anchors with no forward edges) are deliberately *not* errors:
//! the offending item is logged and skipped so one bad entry cannot take
//! down a whole reply.

use thiserror::Error;

use spyglass_core::vname::TicketError;

use crate::store::StoreError;

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, XrefError>;

/// Unified error type for the query service.
#[derive(Debug, Error)]
pub enum XrefError {
    /// Unknown or unsupported request inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A ticket that does not parse as a node identity.
    #[error("invalid ticket {ticket:?}: {source}")]
    InvalidTicket {
        ticket: String,
        #[source]
        source: TicketError,
    },

    /// A store operation failed; `context` names the query step.
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    /// The requested file node carries no text fact.
    #[error("file not found: {ticket}")]
    FileNotFound { ticket: String },

    /// The query's cancellation handle fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl XrefError {
    /// Create an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        XrefError::InvalidRequest(message.into())
    }

    /// Create an invalid-ticket error.
    pub fn invalid_ticket(ticket: impl Into<String>, source: TicketError) -> Self {
        XrefError::InvalidTicket {
            ticket: ticket.into(),
            source,
        }
    }

    /// Map a store failure into a service error, keeping cancellation
    /// unwrapped.
    pub(crate) fn store(context: impl Into<String>) -> impl FnOnce(StoreError) -> XrefError {
        let context = context.into();
        move |source| match source {
            StoreError::Cancelled => XrefError::Cancelled,
            source => XrefError::Store { context, source },
        }
    }
}
