// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mesh agent's reconciliation loop.
//!
//! A single background task fetches the device's desired state from
//! the control plane, diffs it against the previously applied
//! snapshot, and drives the peer-route reconciler and security-policy
//! applier to converge host routing and firewall state. Host network
//! mutations are serialized on this one task; no second reconciler may
//! run for the same host.

mod agent;
mod backoff;
mod client;
mod config;
mod error;
mod http;

pub use agent::{MeshAgent, ShutdownHandle};
pub use backoff::Backoff;
pub use client::ControlPlaneClient;
pub use config::AgentConfig;
pub use error::{AgentError, ConfigError, FetchError, Result};
