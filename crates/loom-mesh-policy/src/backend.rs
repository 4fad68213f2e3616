// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::PolicyError;
use crate::ruleset::TABLE_NAME;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{trace, warn};

/// Trait abstracting the host packet-filter subsystem for testability.
///
/// `apply_script` must be transactional: after it returns Ok, a read
/// of the ruleset observes the full new state, never an intermediate
/// one.
#[async_trait]
pub trait FirewallBackend: Send + Sync {
	/// Apply an nft script as a single transaction.
	async fn apply_script(&self, script: &str) -> Result<(), PolicyError>;

	/// Dump the agent's applied table, for convergence snapshots.
	async fn list_ruleset(&self) -> Result<String, PolicyError>;
}

/// Backend shelling out to nft. Scripts go through `nft -f -` so the
/// whole ruleset swap is one kernel transaction.
pub struct NftBackend;

impl NftBackend {
	pub fn new() -> Self {
		Self
	}
}

impl Default for NftBackend {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl FirewallBackend for NftBackend {
	async fn apply_script(&self, script: &str) -> Result<(), PolicyError> {
		trace!(%script, "applying nft script");

		let mut child = Command::new("nft")
			.args(["-f", "-"])
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| {
				if e.kind() == std::io::ErrorKind::NotFound {
					warn!("nft not found in PATH");
					PolicyError::NotInstalled
				} else {
					PolicyError::Io(e)
				}
			})?;

		if let Some(mut stdin) = child.stdin.take() {
			stdin.write_all(script.as_bytes()).await?;
		}

		let output = child.wait_with_output().await?;
		if output.status.success() {
			Ok(())
		} else {
			Err(PolicyError::Backend {
				args: vec!["-f".to_string(), "-".to_string()],
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			})
		}
	}

	async fn list_ruleset(&self) -> Result<String, PolicyError> {
		let args = ["list", "table", "inet", TABLE_NAME];
		let output = Command::new("nft").args(args).output().await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				PolicyError::NotInstalled
			} else {
				PolicyError::Io(e)
			}
		})?;

		if output.status.success() {
			Ok(String::from_utf8_lossy(&output.stdout).to_string())
		} else {
			// No table applied yet reads as an empty ruleset, matching
			// what an operator sees before the first apply.
			let stderr = String::from_utf8_lossy(&output.stderr);
			if stderr.contains("No such file or directory") {
				Ok(String::new())
			} else {
				Err(PolicyError::Backend {
					args: args.iter().map(|s| s.to_string()).collect(),
					stderr: stderr.trim().to_string(),
				})
			}
		}
	}
}
