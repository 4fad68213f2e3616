// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::backoff::Backoff;
use crate::client::ControlPlaneClient;
use crate::config::AgentConfig;
use crate::error::Result;
use loom_mesh_common::{DeviceState, PeerConfig};
use loom_mesh_policy::{compile, FirewallBackend, RulesetApplier};
use loom_mesh_route::{PeerRouteReconciler, RouteAdapter, RouteConfig};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Cancels the reconciliation loop. Aborts waiting on the next poll
/// interval but never interrupts an in-flight apply phase.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
	tx: watch::Sender<bool>,
}

impl ShutdownHandle {
	pub fn shutdown(&self) {
		let _ = self.tx.send(true);
	}
}

/// The per-host reconciliation loop: fetch desired state, diff against
/// the last applied snapshot, converge routes and firewall policy.
///
/// All host network mutations run inline on this task; a single-writer
/// discipline over the host's network configuration is assumed, so a
/// second agent instance must never run concurrently for the same
/// host.
pub struct MeshAgent<B> {
	config: AgentConfig,
	client: ControlPlaneClient,
	routes: PeerRouteReconciler,
	policy: RulesetApplier<B>,
	last_peers: Option<Vec<PeerConfig>>,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
}

impl<B: FirewallBackend> MeshAgent<B> {
	pub fn new(config: AgentConfig, adapter: Box<dyn RouteAdapter>, backend: B) -> Self {
		let client = ControlPlaneClient::new(
			config.server_url.clone(),
			config.device_id.clone(),
			config.token.clone(),
			Duration::from_secs(config.fetch_timeout_secs),
		);

		let routes = PeerRouteReconciler::new(
			config.os,
			adapter,
			RouteConfig {
				tunnel_iface: config.tunnel_iface.clone(),
				tunnel_address: config.tunnel_address.clone(),
				darwin_child_iface: config.darwin_child_iface.clone(),
			},
		);

		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		Self {
			config,
			client,
			routes,
			policy: RulesetApplier::new(backend),
			last_peers: None,
			shutdown_tx,
			shutdown_rx,
		}
	}

	pub fn shutdown_handle(&self) -> ShutdownHandle {
		ShutdownHandle {
			tx: self.shutdown_tx.clone(),
		}
	}

	/// Runs the loop until shutdown. Transient fetch errors back off
	/// and retry forever; nothing here terminates the process.
	#[instrument(skip(self), fields(device_id = %self.config.device_id, os = %self.config.os))]
	pub async fn run(&mut self) -> Result<()> {
		info!("starting mesh agent reconciliation loop");

		let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
		let mut backoff = Backoff::default();

		loop {
			if *self.shutdown_rx.borrow() {
				break;
			}

			match self.client.fetch_device_state().await {
				Ok(state) => {
					backoff.reset();
					// The apply phase is never interrupted partway;
					// shutdown is only observed between passes.
					self.reconcile(state).await;
					if self.wait(poll_interval).await {
						break;
					}
				}
				Err(e) => {
					let delay = backoff.next_delay();
					warn!(
						error = %e,
						delay_ms = delay.as_millis() as u64,
						"failed to fetch desired state, backing off"
					);
					if self.wait(delay).await {
						break;
					}
				}
			}
		}

		info!("mesh agent stopped");
		Ok(())
	}

	/// One Diffing + Applying pass. Route and firewall mutations run
	/// sequentially within the pass; they share no mutable state and
	/// never race each other.
	pub async fn reconcile(&mut self, state: DeviceState) {
		let peers_changed = self.last_peers.as_deref() != Some(state.peers.as_slice());
		if peers_changed {
			let report = self.routes.reconcile_peers(&state.peers).await;
			if !report.is_clean() {
				// Best-effort convergence: failures were logged per
				// prefix and the next change retries them.
				warn!(
					failures = report.failure_count(),
					mutations = report.mutation_count(),
					"route reconciliation finished with failures"
				);
			}
			self.last_peers = Some(state.peers);
		} else {
			debug!("peer set unchanged, skipping route reconciliation");
		}

		match state.security_group {
			Some(group) => match compile(&self.config.tunnel_iface, &group) {
				Ok(ruleset) => match self.policy.apply(ruleset).await {
					Ok(true) => info!(group_id = %group.id, "security policy applied"),
					Ok(false) => {
						debug!("security policy unchanged");
						self.recreate_policy_if_flushed().await;
					}
					Err(e) => {
						// The one failure class that must block marking
						// the device converged.
						error!(
							error = %e,
							group_id = %group.id,
							"failed to apply security policy"
						);
					}
				},
				Err(e) => {
					error!(error = %e, group_id = %group.id, "failed to compile security group");
				}
			},
			None => {
				if let Err(e) = self.policy.clear().await {
					error!(error = %e, "failed to clear security policy");
				}
			}
		}
	}

	/// Guards against the applied table being flushed out from under
	/// the agent by something external. The in-memory diff alone would
	/// skip forever on unchanged desired state, so when the diff says
	/// unchanged the kernel is asked whether the table is still there
	/// and a missing table is force re-applied.
	async fn recreate_policy_if_flushed(&mut self) {
		let snapshot = match self.policy.snapshot().await {
			Ok(snapshot) => snapshot,
			Err(e) => {
				warn!(error = %e, "failed to read applied ruleset");
				return;
			}
		};
		if !snapshot.trim().is_empty() {
			return;
		}

		let Some(ruleset) = self.policy.last_applied().cloned() else {
			return;
		};
		warn!("applied table missing from kernel, recreating");
		if let Err(e) = self.policy.force_apply(ruleset).await {
			error!(error = %e, "failed to recreate security policy");
		}
	}

	/// Waits out a delay, returning true if shutdown arrived first.
	async fn wait(&mut self, delay: Duration) -> bool {
		let mut rx = self.shutdown_rx.clone();
		tokio::select! {
			biased;

			changed = rx.changed() => changed.is_ok() && *rx.borrow(),

			_ = tokio::time::sleep(delay) => false,
		}
	}
}

impl<B> std::fmt::Debug for MeshAgent<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MeshAgent")
			.field("device_id", &self.config.device_id)
			.field("os", &self.config.os)
			.field("has_peer_snapshot", &self.last_peers.is_some())
			.finish()
	}
}
