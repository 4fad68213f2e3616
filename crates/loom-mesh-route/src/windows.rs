// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::adapter::{is_ipv6, run_route_cmd, RouteAdapter};
use crate::error::RouteError;
use async_trait::async_trait;
use tracing::debug;

/// Route adapter for Windows hosts.
///
/// Idempotency is delegated to netsh itself: adds are attempted
/// without an existence pre-check and "already exists" comes back as
/// an ordinary command failure the reconciler logs and ignores.
pub struct WindowsRouteAdapter;

impl WindowsRouteAdapter {
	pub fn new() -> Self {
		Self
	}
}

impl Default for WindowsRouteAdapter {
	fn default() -> Self {
		Self::new()
	}
}

fn family_subcommand(prefix: &str) -> &'static str {
	if is_ipv6(prefix) {
		"ipv6"
	} else {
		"ipv4"
	}
}

#[async_trait]
impl RouteAdapter for WindowsRouteAdapter {
	async fn route_exists(&self, prefix: &str) -> Result<bool, RouteError> {
		let out = run_route_cmd(
			"netsh",
			&["interface", family_subcommand(prefix), "show", "route"],
		)
		.await?;
		Ok(table_has_prefix(&out, prefix))
	}

	async fn add_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
		run_route_cmd(
			"netsh",
			&["interface", family_subcommand(prefix), "add", "route", prefix, iface],
		)
		.await?;
		debug!(%prefix, %iface, "added route");
		Ok(())
	}

	async fn delete_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
		run_route_cmd(
			"netsh",
			&["interface", family_subcommand(prefix), "delete", "route", prefix, iface],
		)
		.await?;
		debug!(%prefix, %iface, "deleted route");
		Ok(())
	}

	async fn interface_for_address(&self, _addr: &str) -> Result<String, RouteError> {
		// The tunnel device has a fixed name on Windows; nothing on the
		// reconciliation path resolves interfaces by address here.
		Err(RouteError::Unsupported("interface_for_address on windows"))
	}
}

/// Scans `netsh interface ipv4|ipv6 show route` output for an entry
/// whose destination prefix column matches exactly. A substring match
/// would confuse `10.0.0.0/2` with `10.0.0.0/24`.
fn table_has_prefix(output: &str, prefix: &str) -> bool {
	output
		.lines()
		.any(|line| line.split_whitespace().any(|field| field == prefix))
}
