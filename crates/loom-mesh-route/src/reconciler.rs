// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::adapter::{HostOs, RouteAdapter};
use crate::error::RouteError;
use loom_mesh_common::PeerConfig;
use tracing::{debug, error, info, instrument};

/// Resolved interface names handed to the reconciler explicitly,
/// rather than read from process-global state.
#[derive(Debug, Clone)]
pub struct RouteConfig {
	/// Tunnel device name (fixed on Linux and Windows).
	pub tunnel_iface: String,
	/// The tunnel's local address, used on Darwin to resolve the
	/// dynamically-assigned utunN device name.
	pub tunnel_address: String,
	/// Alias device child-prefix routes bind to on Darwin.
	pub darwin_child_iface: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
	Add,
	Delete,
	Skip,
}

/// Outcome of a single route mutation attempt.
#[derive(Debug)]
pub struct RouteOutcome {
	pub prefix: String,
	pub action: RouteAction,
	pub result: Result<(), RouteError>,
}

impl RouteOutcome {
	fn ok(prefix: &str, action: RouteAction) -> Self {
		Self {
			prefix: prefix.to_string(),
			action,
			result: Ok(()),
		}
	}

	fn failed(prefix: &str, action: RouteAction, err: RouteError) -> Self {
		Self {
			prefix: prefix.to_string(),
			action,
			result: Err(err),
		}
	}

	pub fn is_mutation(&self) -> bool {
		self.action != RouteAction::Skip && self.result.is_ok()
	}
}

/// Per-batch report of every mutation outcome. Failures are collected,
/// never propagated; reconciliation of one prefix must not abort the
/// rest.
#[derive(Debug, Default)]
pub struct BatchReport {
	outcomes: Vec<RouteOutcome>,
}

impl BatchReport {
	pub fn push(&mut self, outcome: RouteOutcome) {
		self.outcomes.push(outcome);
	}

	pub fn merge(&mut self, other: BatchReport) {
		self.outcomes.extend(other.outcomes);
	}

	pub fn outcomes(&self) -> &[RouteOutcome] {
		&self.outcomes
	}

	/// Number of routes actually added or deleted.
	pub fn mutation_count(&self) -> usize {
		self.outcomes.iter().filter(|o| o.is_mutation()).count()
	}

	pub fn failure_count(&self) -> usize {
		self.outcomes.iter().filter(|o| o.result.is_err()).count()
	}

	pub fn is_clean(&self) -> bool {
		self.failure_count() == 0
	}
}

/// Issues the minimal set of route add/delete operations to converge
/// the host routing table on a peer set, through the OS-specific
/// [`RouteAdapter`].
pub struct PeerRouteReconciler {
	os: HostOs,
	adapter: Box<dyn RouteAdapter>,
	config: RouteConfig,
}

impl PeerRouteReconciler {
	pub fn new(os: HostOs, adapter: Box<dyn RouteAdapter>, config: RouteConfig) -> Self {
		Self { os, adapter, config }
	}

	pub fn os(&self) -> HostOs {
		self.os
	}

	/// Reconciles routes for a full peer set, including child-prefix
	/// routes, in one pass.
	#[instrument(skip(self, peers), fields(os = %self.os, peer_count = peers.len()))]
	pub async fn reconcile_peers(&self, peers: &[PeerConfig]) -> BatchReport {
		let mut report = BatchReport::default();
		for peer in peers {
			report.merge(self.reconcile_peer(peer).await);
			if let Some(child_prefix) = &peer.child_prefix {
				report.push(self.add_child_prefix_route(child_prefix).await);
			}
		}
		debug!(
			mutations = report.mutation_count(),
			failures = report.failure_count(),
			"peer route reconciliation pass complete"
		);
		report
	}

	/// Reconciles a single peer's allowed-IP routes.
	#[instrument(skip(self, peer), fields(os = %self.os, public_key = %peer.public_key))]
	pub async fn reconcile_peer(&self, peer: &PeerConfig) -> BatchReport {
		match self.os {
			HostOs::Darwin => self.reconcile_darwin(peer).await,
			HostOs::Linux => self.reconcile_linux(peer).await,
			HostOs::Windows => self.reconcile_windows(peer).await,
		}
	}

	/// Darwin: address reassignment does not auto-replace routes, so
	/// any stale exact-prefix route is deleted before the add.
	async fn reconcile_darwin(&self, peer: &PeerConfig) -> BatchReport {
		let mut report = BatchReport::default();

		let iface = match self
			.adapter
			.interface_for_address(&self.config.tunnel_address)
			.await
		{
			Ok(iface) => iface,
			Err(e) => {
				debug!(
					address = %self.config.tunnel_address,
					error = %e,
					"failed to resolve darwin tunnel interface, skipping peer routes"
				);
				for allowed_ip in &peer.allowed_ips {
					report.push(RouteOutcome::ok(allowed_ip, RouteAction::Skip));
				}
				return report;
			}
		};

		for allowed_ip in &peer.allowed_ips {
			match self.adapter.delete_route(allowed_ip, &iface).await {
				Ok(()) => report.push(RouteOutcome::ok(allowed_ip, RouteAction::Delete)),
				Err(e) => debug!(prefix = %allowed_ip, error = %e, "no route deleted"),
			}

			match self.adapter.add_route(allowed_ip, &iface).await {
				Ok(()) => report.push(RouteOutcome::ok(allowed_ip, RouteAction::Add)),
				Err(e) => {
					debug!(prefix = %allowed_ip, error = %e, "route add failed");
					report.push(RouteOutcome::failed(allowed_ip, RouteAction::Add, e));
				}
			}
		}

		report
	}

	/// Linux: existence is checked first and the add skipped when the
	/// route is already present, avoiding route flap.
	async fn reconcile_linux(&self, peer: &PeerConfig) -> BatchReport {
		let mut report = BatchReport::default();

		for allowed_ip in &peer.allowed_ips {
			let exists = match self.adapter.route_exists(allowed_ip).await {
				Ok(exists) => exists,
				Err(e) => {
					info!(prefix = %allowed_ip, error = %e, "route existence check failed");
					false
				}
			};

			if exists {
				report.push(RouteOutcome::ok(allowed_ip, RouteAction::Skip));
				continue;
			}

			match self
				.adapter
				.add_route(allowed_ip, &self.config.tunnel_iface)
				.await
			{
				Ok(()) => report.push(RouteOutcome::ok(allowed_ip, RouteAction::Add)),
				Err(e) => {
					error!(prefix = %allowed_ip, error = %e, "route add failed");
					report.push(RouteOutcome::failed(allowed_ip, RouteAction::Add, e));
				}
			}
		}

		report
	}

	/// Windows: the add is attempted unconditionally and the OS call
	/// itself is trusted to reject duplicates.
	async fn reconcile_windows(&self, peer: &PeerConfig) -> BatchReport {
		let mut report = BatchReport::default();

		for allowed_ip in &peer.allowed_ips {
			match self
				.adapter
				.add_route(allowed_ip, &self.config.tunnel_iface)
				.await
			{
				Ok(()) => report.push(RouteOutcome::ok(allowed_ip, RouteAction::Add)),
				Err(e) => {
					debug!(prefix = %allowed_ip, error = %e, "route add failed");
					report.push(RouteOutcome::failed(allowed_ip, RouteAction::Add, e));
				}
			}
		}

		report
	}

	/// Adds the route for a subnet advertised behind a peer. Presence
	/// is checked once; an existing route is a logged no-op.
	#[instrument(skip(self), fields(os = %self.os))]
	pub async fn add_child_prefix_route(&self, child_prefix: &str) -> RouteOutcome {
		let iface = if self.os == HostOs::Darwin {
			&self.config.darwin_child_iface
		} else {
			&self.config.tunnel_iface
		};

		let exists = match self.adapter.route_exists(child_prefix).await {
			Ok(exists) => exists,
			Err(e) => {
				info!(prefix = %child_prefix, error = %e, "child prefix existence check failed");
				false
			}
		};

		if exists {
			debug!(prefix = %child_prefix, "child prefix route already exists, skipping");
			return RouteOutcome::ok(child_prefix, RouteAction::Skip);
		}

		match self.adapter.add_route(child_prefix, iface).await {
			Ok(()) => RouteOutcome::ok(child_prefix, RouteAction::Add),
			Err(e) => {
				info!(prefix = %child_prefix, error = %e, "error adding child prefix route");
				RouteOutcome::failed(child_prefix, RouteAction::Add, e)
			}
		}
	}
}

impl std::fmt::Debug for PeerRouteReconciler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PeerRouteReconciler")
			.field("os", &self.os)
			.field("config", &self.config)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::HashSet;
	use std::sync::{Arc, Mutex};

	#[derive(Debug, Clone, PartialEq, Eq)]
	enum Call {
		Exists(String),
		Add(String, String),
		Delete(String, String),
		Resolve(String),
	}

	#[derive(Default)]
	struct MockState {
		calls: Mutex<Vec<Call>>,
		routes: Mutex<HashSet<String>>,
		resolve_fails: bool,
		fail_add_for: Option<String>,
	}

	/// Recording adapter with an in-memory routing table. Cloning
	/// shares state so tests can inspect calls after handing the
	/// adapter to the reconciler.
	#[derive(Clone)]
	struct MockAdapter {
		state: Arc<MockState>,
	}

	impl MockAdapter {
		fn new() -> Self {
			Self {
				state: Arc::new(MockState::default()),
			}
		}

		fn failing_resolution() -> Self {
			Self {
				state: Arc::new(MockState {
					resolve_fails: true,
					..MockState::default()
				}),
			}
		}

		fn failing_add_for(prefix: &str) -> Self {
			Self {
				state: Arc::new(MockState {
					fail_add_for: Some(prefix.to_string()),
					..MockState::default()
				}),
			}
		}

		fn calls(&self) -> Vec<Call> {
			self.state.calls.lock().unwrap().clone()
		}

		fn mutating_calls(&self) -> usize {
			self
				.calls()
				.iter()
				.filter(|c| matches!(c, Call::Add(..) | Call::Delete(..)))
				.count()
		}
	}

	#[async_trait]
	impl RouteAdapter for MockAdapter {
		async fn route_exists(&self, prefix: &str) -> Result<bool, RouteError> {
			self
				.state
				.calls
				.lock()
				.unwrap()
				.push(Call::Exists(prefix.to_string()));
			Ok(self.state.routes.lock().unwrap().contains(prefix))
		}

		async fn add_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
			self
				.state
				.calls
				.lock()
				.unwrap()
				.push(Call::Add(prefix.to_string(), iface.to_string()));
			if self.state.fail_add_for.as_deref() == Some(prefix) {
				return Err(RouteError::CommandFailed {
					cmd: "ip",
					args: vec!["route".to_string(), "add".to_string(), prefix.to_string()],
					stderr: "RTNETLINK answers: File exists".to_string(),
				});
			}
			self.state.routes.lock().unwrap().insert(prefix.to_string());
			Ok(())
		}

		async fn delete_route(&self, prefix: &str, iface: &str) -> Result<(), RouteError> {
			self
				.state
				.calls
				.lock()
				.unwrap()
				.push(Call::Delete(prefix.to_string(), iface.to_string()));
			if self.state.routes.lock().unwrap().remove(prefix) {
				Ok(())
			} else {
				Err(RouteError::CommandFailed {
					cmd: "route",
					args: vec!["delete".to_string(), prefix.to_string()],
					stderr: "not in table".to_string(),
				})
			}
		}

		async fn interface_for_address(&self, addr: &str) -> Result<String, RouteError> {
			self
				.state
				.calls
				.lock()
				.unwrap()
				.push(Call::Resolve(addr.to_string()));
			if self.state.resolve_fails {
				Err(RouteError::InterfaceResolution(addr.to_string()))
			} else {
				Ok("utun8".to_string())
			}
		}
	}

	fn config() -> RouteConfig {
		RouteConfig {
			tunnel_iface: "wg0".to_string(),
			tunnel_address: "100.64.0.1".to_string(),
			darwin_child_iface: "utun8".to_string(),
		}
	}

	fn reconciler(os: HostOs, adapter: MockAdapter) -> (PeerRouteReconciler, MockAdapter) {
		let handle = adapter.clone();
		(
			PeerRouteReconciler::new(os, Box::new(adapter), config()),
			handle,
		)
	}

	fn peer(allowed_ips: &[&str]) -> PeerConfig {
		PeerConfig::new("pk-test", allowed_ips.iter().map(|s| s.to_string()).collect())
	}

	#[tokio::test]
	async fn test_linux_adds_missing_routes() {
		let (reconciler, adapter) = reconciler(HostOs::Linux, MockAdapter::new());
		let report = reconciler
			.reconcile_peer(&peer(&["100.64.0.2/32", "100.64.0.3/32"]))
			.await;

		assert_eq!(report.mutation_count(), 2);
		assert!(report.is_clean());
		assert!(adapter
			.calls()
			.contains(&Call::Add("100.64.0.2/32".to_string(), "wg0".to_string())));
	}

	#[tokio::test]
	async fn test_linux_second_pass_is_idempotent() {
		let (reconciler, adapter) = reconciler(HostOs::Linux, MockAdapter::new());
		let p = peer(&["100.64.0.2/32", "100.64.0.3/32"]);

		let first = reconciler.reconcile_peer(&p).await;
		assert_eq!(first.mutation_count(), 2);
		let mutations_after_first = adapter.mutating_calls();

		let second = reconciler.reconcile_peer(&p).await;
		assert_eq!(second.mutation_count(), 0);
		assert_eq!(adapter.mutating_calls(), mutations_after_first);
	}

	#[tokio::test]
	async fn test_linux_failure_does_not_abort_batch() {
		let (reconciler, adapter) =
			reconciler(HostOs::Linux, MockAdapter::failing_add_for("100.64.0.2/32"));
		let report = reconciler
			.reconcile_peer(&peer(&["100.64.0.2/32", "100.64.0.3/32"]))
			.await;

		assert_eq!(report.failure_count(), 1);
		assert_eq!(report.mutation_count(), 1);
		// both adds were still attempted
		assert!(adapter
			.calls()
			.contains(&Call::Add("100.64.0.3/32".to_string(), "wg0".to_string())));
	}

	#[tokio::test]
	async fn test_darwin_deletes_stale_route_before_add() {
		let (reconciler, adapter) = reconciler(HostOs::Darwin, MockAdapter::new());
		let p = peer(&["100.64.0.2/32"]);

		// first pass: nothing to delete, the add lands
		reconciler.reconcile_peer(&p).await;
		// second pass: stale entry is deleted then re-added
		reconciler.reconcile_peer(&p).await;

		let calls = adapter.calls();
		let delete_pos = calls
			.iter()
			.position(|c| matches!(c, Call::Delete(p, _) if p == "100.64.0.2/32"))
			.expect("expected a delete on the second pass");
		let add_pos = calls
			.iter()
			.rposition(|c| matches!(c, Call::Add(p, _) if p == "100.64.0.2/32"))
			.unwrap();
		assert!(delete_pos < add_pos);
	}

	#[tokio::test]
	async fn test_darwin_resolves_iface_from_tunnel_address() {
		let (reconciler, adapter) = reconciler(HostOs::Darwin, MockAdapter::new());
		reconciler.reconcile_peer(&peer(&["100.64.0.2/32"])).await;

		let calls = adapter.calls();
		assert!(calls.contains(&Call::Resolve("100.64.0.1".to_string())));
		assert!(calls.contains(&Call::Add("100.64.0.2/32".to_string(), "utun8".to_string())));
	}

	#[tokio::test]
	async fn test_darwin_resolution_failure_skips_peer_nonfatally() {
		let (reconciler, adapter) = reconciler(HostOs::Darwin, MockAdapter::failing_resolution());
		let report = reconciler
			.reconcile_peer(&peer(&["100.64.0.2/32", "100.64.0.3/32"]))
			.await;

		assert!(report.is_clean());
		assert_eq!(report.mutation_count(), 0);
		assert_eq!(adapter.mutating_calls(), 0);
	}

	#[tokio::test]
	async fn test_windows_adds_without_existence_check() {
		let (reconciler, adapter) = reconciler(HostOs::Windows, MockAdapter::new());
		reconciler.reconcile_peer(&peer(&["100.64.0.2/32"])).await;
		reconciler.reconcile_peer(&peer(&["100.64.0.2/32"])).await;

		let calls = adapter.calls();
		assert!(!calls.iter().any(|c| matches!(c, Call::Exists(_))));
		assert_eq!(
			calls
				.iter()
				.filter(|c| matches!(c, Call::Add(..)))
				.count(),
			2
		);
	}

	#[tokio::test]
	async fn test_child_prefix_route_added_once() {
		let (reconciler, adapter) = reconciler(HostOs::Linux, MockAdapter::new());

		let first = reconciler.add_child_prefix_route("172.16.20.0/24").await;
		assert_eq!(first.action, RouteAction::Add);
		assert!(first.result.is_ok());

		let second = reconciler.add_child_prefix_route("172.16.20.0/24").await;
		assert_eq!(second.action, RouteAction::Skip);
		assert_eq!(adapter.mutating_calls(), 1);
	}

	#[tokio::test]
	async fn test_child_prefix_uses_alias_device_on_darwin() {
		let (reconciler, adapter) = reconciler(HostOs::Darwin, MockAdapter::new());
		reconciler.add_child_prefix_route("172.16.20.0/24").await;

		assert!(adapter
			.calls()
			.contains(&Call::Add("172.16.20.0/24".to_string(), "utun8".to_string())));
	}

	#[tokio::test]
	async fn test_reconcile_peers_includes_child_prefixes() {
		let (reconciler, _adapter) = reconciler(HostOs::Linux, MockAdapter::new());
		let peers = vec![
			peer(&["100.64.0.2/32"]).with_child_prefix("172.16.20.0/24"),
			peer(&["100.64.0.3/32"]),
		];

		let report = reconciler.reconcile_peers(&peers).await;
		assert_eq!(report.mutation_count(), 3);
		assert!(report.is_clean());
	}
}
