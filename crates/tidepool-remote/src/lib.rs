//! tidepool-remote — HTTP adapters for the tidepool control loop.
//!
//! # Architecture
//!
//! ```text
//! PollDriver
//!   ├── GatewayClient  ── GET/PUT/DELETE /cluster, GET /queue, GET|POST /app
//!   ├── LivyJobEngine  ── GET /batches
//!   └── HttpAlertSink  ── POST {"alert": {"error": ...}}  (fire-and-forget)
//! ```
//!
//! All three share `HttpClient`, a one-connection-per-request HTTP/1.1
//! client bounded by a per-call timeout. The management gateway holds the
//! cloud credentials; the controller itself never sees them.

pub mod alert;
pub mod client;
pub mod gateway;
pub mod livy;

#[cfg(test)]
mod test_server;

pub use alert::HttpAlertSink;
pub use client::{HttpClient, HttpError, HttpResponse};
pub use gateway::GatewayClient;
pub use livy::LivyJobEngine;
