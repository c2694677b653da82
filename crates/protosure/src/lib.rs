//! Protosure CRM integration.
//!
//! This crate owns the outbound side of duplicate detection:
//! - **Client** (`client`) - session login against `/auth/ajax_login/` and
//!   aggregation count queries against `/api/reports/query/`
//! - **Queries** (`query`) - pure builders for the match-then-count pipelines
//!
//! The `CrmApi` and `CrmConnector` traits are the seams the webhook policy is
//! written against; production code plugs in `ProtosureClient`, tests plug in
//! fakes.

pub mod client;
pub mod query;

pub use client::{
    CrmApi, CrmConnector, CrmError, ProtosureClient, ProtosureConnector, ProtosureSession,
};
pub use query::{count_from_rows, name_count_query, zip_count_query};
