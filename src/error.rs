//! Crate-wide error taxonomy.
//!
//! Every subsystem (`repository`, `tm`, `jobs`, `sync`) defines its own
//! error type, but each one maps onto this fixed set of kinds so the
//! request surface can translate to stable external codes without
//! losing the distinction callers rely on (see spec §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error kind. Variant names match the taxonomy in spec §7
/// exactly so propagation never has to rename a kind in transit.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("cancelled")]
    Cancelled,

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(entity: impl std::fmt::Display) -> Self {
        Self::NotFound(entity.to_string())
    }

    pub fn conflict(msg: impl std::fmt::Display) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn invalid(msg: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub fn forbidden(msg: impl std::fmt::Display) -> Self {
        Self::Forbidden(msg.to_string())
    }

    pub fn precondition(msg: impl std::fmt::Display) -> Self {
        Self::Precondition(msg.to_string())
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Whether a caller may retry this error automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::ResourceExhausted(_))
    }

    /// Stable kind label for external-code mapping and logging, never
    /// the `Display` message (which may carry entity-identifying text).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Precondition(_) => "precondition",
            Self::ResourceExhausted(_) => "resource_exhausted",
            Self::Transient(_) => "transient",
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(e: sea_orm::DbErr) -> Self {
        match &e {
            sea_orm::DbErr::RecordNotFound(msg) => Error::NotFound(msg.clone()),
            sea_orm::DbErr::Query(_) | sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_) => {
                Error::Transient(e.to_string())
            }
            _ => Error::Internal(e.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transient(e.to_string())
    }
}
