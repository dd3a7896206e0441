//! # phiguard-dashboard
//!
//! HTTP API over the phiguard audit engine.
//!
//! Routes:
//! - `GET /healthz` - liveness plus write-path failure counters
//! - `POST /api/audit-logs` - record an event
//! - `GET /api/audit-logs` - filtered, paginated query with statistics
//! - `GET /api/audit-logs/export` - CSV or JSON attachment
//! - `GET /api/audit-logs/{id}` - one entry with security analysis
//! - `POST /api/access/check` - access decision (denials are audited)
//! - `GET /api/retention/evaluate` - retention decision for a resource type and age
//! - `POST /api/retention/sweep` - run a retention sweep now
//!
//! The UI that consumes this API lives elsewhere.

pub mod api_types;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::DashboardError;
pub use routes::create_router;
pub use server::DashboardServer;
pub use state::AppState;
