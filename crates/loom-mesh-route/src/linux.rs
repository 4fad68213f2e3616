// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::adapter::{is_ipv6, run_route_cmd, RouteAdapter};
use crate::error::RouteError;
use async_trait::async_trait;
use tracing::debug;

/// Route adapter backed by iproute2. The tunnel interface has a fixed,
/// well-known name on Linux, so callers pass it straight through.
pub struct LinuxRouteAdapter;

impl LinuxRouteAdapter {
	pub fn new() -> Self {
		Self
	}
}

impl Default for LinuxRouteAdapter {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl RouteAdapter for LinuxRouteAdapter {
	async fn route_exists(&self, prefix: &str) -> Result<bool, RouteError> {
		// `ip route show <prefix>` prints only an exact-match entry.
		let args = if is_ipv6(prefix) {
			["-6", "route", "show", prefix]
		} else {
			["-4", "route", "show", prefix]
		};
		let out = run_route_cmd("ip", &args).await?;
		Ok(!out.is_empty())
	}

	async fn add_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
		run_route_cmd("ip", &["route", "add", prefix, "dev", iface]).await?;
		debug!(%prefix, %iface, "added route");
		Ok(())
	}

	async fn delete_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
		run_route_cmd("ip", &["route", "del", prefix, "dev", iface]).await?;
		debug!(%prefix, %iface, "deleted route");
		Ok(())
	}

	async fn interface_for_address(&self, addr: &str) -> Result<String, RouteError> {
		let out = run_route_cmd("ip", &["-o", "addr", "show"]).await?;
		parse_iface_for_address(&out, addr)
			.ok_or_else(|| RouteError::InterfaceResolution(addr.to_string()))
	}
}

/// Parses `ip -o addr show` output, returning the interface whose
/// address list contains `addr`.
fn parse_iface_for_address(output: &str, addr: &str) -> Option<String> {
	for line in output.lines() {
		// "5: wg0    inet 100.64.0.1/32 scope global wg0\ ..."
		let mut fields = line.split_whitespace();
		let _index = fields.next()?;
		let iface = fields.next()?;
		let _family = fields.next()?;
		let cidr = fields.next()?;

		let line_addr = cidr.split('/').next().unwrap_or(cidr);
		if line_addr == addr {
			return Some(iface.trim_end_matches(':').to_string());
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_iface_for_address() {
		let output = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth0    inet 10.0.2.15/24 brd 10.0.2.255 scope global eth0\\       valid_lft forever
5: wg0    inet 100.64.0.1/32 scope global wg0\\       valid_lft forever preferred_lft forever";

		assert_eq!(
			parse_iface_for_address(output, "100.64.0.1"),
			Some("wg0".to_string())
		);
		assert_eq!(
			parse_iface_for_address(output, "10.0.2.15"),
			Some("eth0".to_string())
		);
		assert_eq!(parse_iface_for_address(output, "192.0.2.1"), None);
	}

	#[test]
	fn test_parse_iface_empty_output() {
		assert_eq!(parse_iface_for_address("", "100.64.0.1"), None);
	}
}
