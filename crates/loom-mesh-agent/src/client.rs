// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::FetchError;
use loom_mesh_common::DeviceState;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Client for the control plane's per-device desired-state endpoint.
pub struct ControlPlaneClient {
	server_url: Url,
	http_client: Client,
	device_id: String,
	token: String,
}

impl ControlPlaneClient {
	pub fn new(server_url: Url, device_id: String, token: String, timeout: Duration) -> Self {
		Self {
			server_url,
			http_client: crate::http::new_client(timeout),
			device_id,
			token,
		}
	}

	/// Fetches the device's desired state: peer list, endpoints, and
	/// the owning security group (if any).
	#[instrument(skip(self), fields(device_id = %self.device_id))]
	pub async fn fetch_device_state(&self) -> Result<DeviceState, FetchError> {
		let url = self
			.server_url
			.join(&format!("/api/devices/{}/state", self.device_id))?;

		debug!(%url, "fetching desired state");

		let state = self
			.http_client
			.get(url)
			.header("Authorization", format!("Bearer {}", self.token))
			.send()
			.await?
			.error_for_status()?
			.json::<DeviceState>()
			.await?;

		debug!(
			peer_count = state.peers.len(),
			has_security_group = state.security_group.is_some(),
			"fetched desired state"
		);

		Ok(state)
	}

	pub fn device_id(&self) -> &str {
		&self.device_id
	}
}

impl std::fmt::Debug for ControlPlaneClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ControlPlaneClient")
			.field("server_url", &self.server_url)
			.field("device_id", &self.device_id)
			.field("has_token", &!self.token.is_empty())
			.finish()
	}
}
