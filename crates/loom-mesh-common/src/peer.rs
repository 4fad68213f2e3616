// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Desired tunnel configuration for a single peer.
///
/// Replaced wholesale whenever the control plane reports a change and
/// immutable once handed to the route reconciler for a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConfig {
	pub public_key: String,
	#[serde(default)]
	pub endpoint: Option<SocketAddr>,
	/// Prefixes this peer is authorized to route traffic for, in
	/// control-plane order.
	pub allowed_ips: Vec<String>,
	/// A routed subnet behind the peer, beyond its own tunnel address.
	#[serde(default)]
	pub child_prefix: Option<String>,
}

impl PeerConfig {
	pub fn new(public_key: impl Into<String>, allowed_ips: Vec<String>) -> Self {
		Self {
			public_key: public_key.into(),
			endpoint: None,
			allowed_ips,
			child_prefix: None,
		}
	}

	pub fn with_endpoint(mut self, endpoint: SocketAddr) -> Self {
		self.endpoint = Some(endpoint);
		self
	}

	pub fn with_child_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.child_prefix = Some(prefix.into());
		self
	}
}
