//! printwatch Client - Moonraker access and polling
//!
//! This crate talks to the printer controller:
//! - Command sending (fire-and-forget or waited G-code scripts)
//! - Liveness and telemetry fetches over HTTP
//! - The poll scheduler that sequences fetches and feeds the reconciler

pub mod client;
pub mod scheduler;

pub use client::{ClientError, ControllerApi, ControllerClient, ControllerEndpoint};
pub use scheduler::{PollScheduler, DEFAULT_POLL_INTERVAL};
