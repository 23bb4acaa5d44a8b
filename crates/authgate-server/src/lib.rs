//! HTTP surface of Authgate
//!
//! A single `/auth` endpoint for reverse proxies (nginx `auth_request`,
//! Traefik `forwardAuth`, ...), plus `/health` and `/metrics`.

pub mod metrics;
pub mod routes;
pub mod server;

pub use crate::metrics::MetricsRecorder;
pub use crate::server::{build_authenticator, router, AppState, AuthServer};
