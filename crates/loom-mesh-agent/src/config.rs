// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::ConfigError;
use loom_mesh_route::HostOs;
use url::Url;

fn validate_https_url(url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		return Err(ConfigError::Parse(
			"server URL must use https://".to_string(),
		));
	}
	Ok(())
}

#[derive(Clone)]
pub struct AgentConfig {
	pub server_url: Url,
	pub device_id: String,
	pub token: String,
	/// OS family, fixed at startup; never re-detected per call.
	pub os: HostOs,
	pub tunnel_iface: String,
	/// The tunnel's local address, used on Darwin to resolve the
	/// dynamic utunN device name.
	pub tunnel_address: String,
	pub darwin_child_iface: String,
	pub poll_interval_secs: u64,
	pub fetch_timeout_secs: u64,
}

impl AgentConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		let server_url: Url = std::env::var("LOOM_MESH_SERVER_URL")
			.map_err(|_| ConfigError::MissingEnv("LOOM_MESH_SERVER_URL".to_string()))?
			.parse()
			.map_err(|e| ConfigError::Parse(format!("invalid LOOM_MESH_SERVER_URL: {e}")))?;
		validate_https_url(&server_url)?;

		let device_id = std::env::var("LOOM_MESH_DEVICE_ID")
			.map_err(|_| ConfigError::MissingEnv("LOOM_MESH_DEVICE_ID".to_string()))?;

		let token = std::env::var("LOOM_MESH_TOKEN")
			.map_err(|_| ConfigError::MissingEnv("LOOM_MESH_TOKEN".to_string()))?;

		let os: HostOs = std::env::var("LOOM_MESH_OS")
			.unwrap_or_else(|_| "linux".to_string())
			.parse()
			.map_err(ConfigError::Parse)?;

		let tunnel_iface =
			std::env::var("LOOM_MESH_TUNNEL_IFACE").unwrap_or_else(|_| "wg0".to_string());

		let tunnel_address = std::env::var("LOOM_MESH_TUNNEL_ADDRESS")
			.map_err(|_| ConfigError::MissingEnv("LOOM_MESH_TUNNEL_ADDRESS".to_string()))?;

		let darwin_child_iface =
			std::env::var("LOOM_MESH_DARWIN_CHILD_IFACE").unwrap_or_else(|_| "utun8".to_string());

		let poll_interval_secs = std::env::var("LOOM_MESH_POLL_SECS")
			.ok()
			.and_then(|s| s.parse().ok())
			.unwrap_or(5);

		let fetch_timeout_secs = std::env::var("LOOM_MESH_FETCH_TIMEOUT_SECS")
			.ok()
			.and_then(|s| s.parse().ok())
			.unwrap_or(10);

		Ok(Self {
			server_url,
			device_id,
			token,
			os,
			tunnel_iface,
			tunnel_address,
			darwin_child_iface,
			poll_interval_secs,
			fetch_timeout_secs,
		})
	}

	pub fn new(
		server_url: Url,
		device_id: String,
		token: String,
		os: HostOs,
		tunnel_address: String,
	) -> Result<Self, ConfigError> {
		validate_https_url(&server_url)?;
		Ok(Self {
			server_url,
			device_id,
			token,
			os,
			tunnel_iface: "wg0".to_string(),
			tunnel_address,
			darwin_child_iface: "utun8".to_string(),
			poll_interval_secs: 5,
			fetch_timeout_secs: 10,
		})
	}

	#[cfg(test)]
	pub fn new_insecure(server_url: Url, device_id: String, os: HostOs) -> Self {
		Self {
			server_url,
			device_id,
			token: "test-token".to_string(),
			os,
			tunnel_iface: "wg0".to_string(),
			tunnel_address: "100.64.0.1".to_string(),
			darwin_child_iface: "utun8".to_string(),
			poll_interval_secs: 5,
			fetch_timeout_secs: 1,
		}
	}
}

impl std::fmt::Debug for AgentConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AgentConfig")
			.field("server_url", &self.server_url)
			.field("device_id", &self.device_id)
			.field("has_token", &!self.token.is_empty())
			.field("os", &self.os)
			.field("tunnel_iface", &self.tunnel_iface)
			.field("tunnel_address", &self.tunnel_address)
			.field("poll_interval_secs", &self.poll_interval_secs)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_new() {
		let config = AgentConfig::new(
			"https://mesh.example.com".parse().unwrap(),
			"device-123".to_string(),
			"tok".to_string(),
			HostOs::Linux,
			"100.64.0.1".to_string(),
		)
		.unwrap();
		assert_eq!(config.device_id, "device-123");
		assert_eq!(config.tunnel_iface, "wg0");
		assert_eq!(config.poll_interval_secs, 5);
	}

	#[test]
	fn test_config_new_rejects_http() {
		let result = AgentConfig::new(
			"http://mesh.example.com".parse().unwrap(),
			"device-123".to_string(),
			"tok".to_string(),
			HostOs::Linux,
			"100.64.0.1".to_string(),
		);
		assert!(result.is_err());
	}

	#[test]
	fn test_config_debug_does_not_leak_token() {
		let config = AgentConfig::new(
			"https://mesh.example.com".parse().unwrap(),
			"device-123".to_string(),
			"super-secret".to_string(),
			HostOs::Linux,
			"100.64.0.1".to_string(),
		)
		.unwrap();
		let debug = format!("{config:?}");
		assert!(debug.contains("has_token"));
		assert!(!debug.contains("super-secret"));
	}
}
