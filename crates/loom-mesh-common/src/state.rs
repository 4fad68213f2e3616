// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::endpoint::Endpoint;
use crate::peer::PeerConfig;
use crate::rule::SecurityGroup;
use serde::{Deserialize, Serialize};

/// The per-device desired-state snapshot fetched from the control
/// plane on each reconciliation pass.
///
/// A device belongs to at most one security group; `security_group:
/// None` maps to the default-permit policy, which is distinct from a
/// group with empty rule lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
	#[serde(default)]
	pub peers: Vec<PeerConfig>,
	#[serde(default)]
	pub security_group: Option<SecurityGroup>,
	#[serde(default)]
	pub endpoints: Vec<Endpoint>,
}

impl DeviceState {
	pub fn empty() -> Self {
		Self {
			peers: Vec::new(),
			security_group: None,
			endpoints: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_device_state_defaults() {
		let state: DeviceState = serde_json::from_str("{}").unwrap();
		assert_eq!(state, DeviceState::empty());
	}

	#[test]
	fn test_device_state_roundtrip() {
		let json = r#"{
			"peers": [
				{"publicKey":"pk-1","allowedIps":["100.64.0.2/32"],"childPrefix":"172.16.20.0/24"}
			],
			"securityGroup": {
				"id": "sg-1",
				"organizationId": "org-1",
				"inboundRules": [],
				"outboundRules": []
			},
			"endpoints": [
				{"address":"192.168.1.10:51820","distance":2,"source":"local"}
			]
		}"#;

		let state: DeviceState = serde_json::from_str(json).unwrap();
		assert_eq!(state.peers.len(), 1);
		assert!(state.security_group.is_some());
		assert_eq!(state.endpoints.len(), 1);

		let reparsed: DeviceState =
			serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
		assert_eq!(state, reparsed);
	}
}
