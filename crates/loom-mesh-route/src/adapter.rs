// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::RouteError;
use async_trait::async_trait;
use std::fmt;
use tokio::process::Command;
use tracing::{trace, warn};

/// Operating-system family the agent is running on, selected once at
/// startup via configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
	Linux,
	Darwin,
	Windows,
}

impl HostOs {
	pub fn as_str(&self) -> &'static str {
		match self {
			HostOs::Linux => "linux",
			HostOs::Darwin => "darwin",
			HostOs::Windows => "windows",
		}
	}
}

impl fmt::Display for HostOs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for HostOs {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"linux" => Ok(HostOs::Linux),
			"darwin" | "macos" => Ok(HostOs::Darwin),
			"windows" => Ok(HostOs::Windows),
			other => Err(format!("unknown OS family: {other}")),
		}
	}
}

/// Trait abstracting host routing-table operations for testability and
/// per-OS behavior.
///
/// Prefixes are CIDR strings; interface names are OS-native device
/// names. Implementations shell out to the platform's route tooling
/// and must treat "route already exists" as an ordinary error value,
/// never a panic.
#[async_trait]
pub trait RouteAdapter: Send + Sync {
	/// Check whether an exact route for the prefix is present.
	async fn route_exists(&self, prefix: &str) -> Result<bool, RouteError>;

	/// Add a route for the prefix via the given interface.
	async fn add_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError>;

	/// Delete the route for the prefix bound to the given interface.
	async fn delete_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError>;

	/// Resolve the name of the local interface holding the address.
	async fn interface_for_address(&self, addr: &str) -> Result<String, RouteError>;
}

/// Runs a route-manipulation command, mapping a missing binary to
/// [`RouteError::NotInstalled`] and a non-zero exit to
/// [`RouteError::CommandFailed`].
pub(crate) async fn run_route_cmd(cmd: &'static str, args: &[&str]) -> Result<String, RouteError> {
	trace!(cmd = %format!("{cmd} {}", args.join(" ")), "running route command");

	let output = Command::new(cmd).args(args).output().await.map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			warn!(%cmd, "route tooling not found in PATH");
			RouteError::NotInstalled(cmd)
		} else {
			RouteError::Io(e)
		}
	})?;

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	} else {
		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		Err(RouteError::CommandFailed {
			cmd,
			args: args.iter().map(|s| s.to_string()).collect(),
			stderr,
		})
	}
}

/// True when the prefix (or address) is IPv6.
pub(crate) fn is_ipv6(prefix: &str) -> bool {
	prefix.contains(':')
}
