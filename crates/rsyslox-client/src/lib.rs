//! Query API client for rsyslox
//!
//! This crate provides the HTTP side of the log explorer: fetching pages of
//! log rows, distinct column values for filter pickers, and the public
//! health probe. Credentials come from a [`SessionProvider`].

mod client;
mod error;
mod session;

pub use client::{HttpLogApi, LogApi};
pub use error::ApiError;
pub use session::{Credential, SessionProvider, SessionStore};

// Re-export types that are used in our public API
pub use rsyslox_types::{HealthStatus, LogEntry, LogsPage, MetaValue, MetaValues, QueryParams};
