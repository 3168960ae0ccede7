//! HTTP gateway for the garden service.
//!
//! ```text
//! GET  /api/health           liveness probe (no identity required)
//! GET  /api/garden           current plants and streaks
//! POST /api/garden/initiate  plant a garden from initial habits
//! PUT  /api/garden/update    run one update cycle
//! ```
//!
//! The caller's identity comes from the `x-user-id` header set by the
//! fronting authentication proxy.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod types;

pub use server::{GatewayState, build_router, start_server};
