// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host routing-table reconciliation for the mesh overlay agent.
//!
//! This crate provides:
//! - [`RouteAdapter`]: a capability-set abstraction over the host's
//!   routing table, with one implementation per OS family
//! - [`PeerRouteReconciler`]: maps a peer's allowed-IP list and child
//!   prefix into the minimal set of route mutations, idempotently and
//!   best-effort (a failed prefix never aborts the rest of the batch)

mod adapter;
mod darwin;
mod error;
mod linux;
mod reconciler;
mod windows;

pub use adapter::{HostOs, RouteAdapter};
pub use darwin::DarwinRouteAdapter;
pub use error::{Result, RouteError};
pub use linux::LinuxRouteAdapter;
pub use reconciler::{BatchReport, PeerRouteReconciler, RouteAction, RouteConfig, RouteOutcome};
pub use windows::WindowsRouteAdapter;

/// Selects the route adapter for the configured OS family. Called once
/// at startup; the OS is never re-detected per call.
pub fn adapter_for(os: HostOs) -> Box<dyn RouteAdapter> {
	match os {
		HostOs::Linux => Box::new(LinuxRouteAdapter::new()),
		HostOs::Darwin => Box::new(DarwinRouteAdapter::new()),
		HostOs::Windows => Box::new(WindowsRouteAdapter::new()),
	}
}
