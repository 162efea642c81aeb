//! HTTP API.
//!
//! `api_router()` returns a composable `Router` with every route nested
//! under `/api/`. `server` binds it and runs until shutdown.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer};
pub use types::ApiContext;
