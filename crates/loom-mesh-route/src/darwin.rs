// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::adapter::{is_ipv6, run_route_cmd, RouteAdapter};
use crate::error::RouteError;
use async_trait::async_trait;
use tracing::debug;

/// Route adapter for Darwin hosts.
///
/// The tunnel device surfaces as a dynamically-assigned utunN name, so
/// the reconciler resolves it from the tunnel's local address via
/// [`RouteAdapter::interface_for_address`] rather than assuming a
/// well-known name.
pub struct DarwinRouteAdapter;

impl DarwinRouteAdapter {
	pub fn new() -> Self {
		Self
	}
}

impl Default for DarwinRouteAdapter {
	fn default() -> Self {
		Self::new()
	}
}

fn family_flag(prefix: &str) -> &'static str {
	if is_ipv6(prefix) {
		"-inet6"
	} else {
		"-inet"
	}
}

#[async_trait]
impl RouteAdapter for DarwinRouteAdapter {
	async fn route_exists(&self, prefix: &str) -> Result<bool, RouteError> {
		let result = run_route_cmd("route", &["-n", "get", family_flag(prefix), prefix]).await;
		match result {
			Ok(_) => Ok(true),
			Err(RouteError::CommandFailed { .. }) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn add_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
		run_route_cmd(
			"route",
			&["-q", "-n", "add", family_flag(prefix), prefix, "-interface", iface],
		)
		.await?;
		debug!(%prefix, %iface, "added route");
		Ok(())
	}

	async fn delete_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
		run_route_cmd(
			"route",
			&["-q", "-n", "delete", family_flag(prefix), prefix, "-interface", iface],
		)
		.await?;
		debug!(%prefix, %iface, "deleted route");
		Ok(())
	}

	async fn interface_for_address(&self, addr: &str) -> Result<String, RouteError> {
		let out = run_route_cmd("ifconfig", &[]).await?;
		parse_ifconfig_for_address(&out, addr)
			.ok_or_else(|| RouteError::InterfaceResolution(addr.to_string()))
	}
}

/// Scans ifconfig output for the stanza holding `addr` and returns its
/// interface name.
fn parse_ifconfig_for_address(output: &str, addr: &str) -> Option<String> {
	let mut current_iface: Option<&str> = None;

	for line in output.lines() {
		if !line.starts_with(char::is_whitespace) {
			// "utun8: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1280"
			current_iface = line.split(':').next();
			continue;
		}

		let mut fields = line.split_whitespace();
		match fields.next() {
			Some("inet") | Some("inet6") => {
				let line_addr = fields.next()?;
				// inet6 addresses carry a scope suffix: "fe80::1%utun8"
				let line_addr = line_addr.split('%').next().unwrap_or(line_addr);
				if line_addr == addr {
					return current_iface.map(|s| s.to_string());
				}
			}
			_ => continue,
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	const IFCONFIG_OUTPUT: &str = "\
lo0: flags=8049<UP,LOOPBACK,RUNNING,MULTICAST> mtu 16384
\tinet 127.0.0.1 netmask 0xff000000
en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tinet 192.168.1.23 netmask 0xffffff00 broadcast 192.168.1.255
utun8: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1280
\tinet 100.64.0.12 --> 100.64.0.12 netmask 0xffffffff
\tinet6 fe80::ce81:b1c:bd2c:69e%utun8 prefixlen 64 scopeid 0x10";

	#[test]
	fn test_parse_ifconfig_resolves_utun() {
		assert_eq!(
			parse_ifconfig_for_address(IFCONFIG_OUTPUT, "100.64.0.12"),
			Some("utun8".to_string())
		);
	}

	#[test]
	fn test_parse_ifconfig_scoped_ipv6() {
		assert_eq!(
			parse_ifconfig_for_address(IFCONFIG_OUTPUT, "fe80::ce81:b1c:bd2c:69e"),
			Some("utun8".to_string())
		);
	}

	#[test]
	fn test_parse_ifconfig_unknown_address() {
		assert_eq!(parse_ifconfig_for_address(IFCONFIG_OUTPUT, "203.0.113.1"), None);
	}

	#[test]
	fn test_family_flag() {
		assert_eq!(family_flag("100.64.0.0/10"), "-inet");
		assert_eq!(family_flag("200::/64"), "-inet6");
	}
}
