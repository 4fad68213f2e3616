// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// How an endpoint was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSource {
	/// Address observed on the device's own network.
	Local,
	/// Address as seen from outside the device's network (NAT-translated).
	Reflexive,
}

/// A candidate address for reaching a peer, produced by endpoint
/// discovery and consumed read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
	/// IP address and port of the endpoint.
	pub address: String,
	/// Distance in milliseconds from the node to the address.
	pub distance: i32,
	pub source: EndpointSource,
}

impl Endpoint {
	pub fn socket_addr(&self) -> Option<SocketAddr> {
		self.address.parse().ok()
	}
}

/// Selects the local-network endpoint, used for same-network
/// optimization when two peers share a LAN.
pub fn local_endpoint(endpoints: &[Endpoint]) -> Option<&Endpoint> {
	endpoints
		.iter()
		.find(|e| e.source == EndpointSource::Local)
}

/// All reflexive endpoints, in reported order. These are the fallback
/// and relay candidates when no local endpoint is usable.
pub fn reflexive_endpoints(endpoints: &[Endpoint]) -> Vec<&Endpoint> {
	endpoints
		.iter()
		.filter(|e| e.source == EndpointSource::Reflexive)
		.collect()
}
