// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::Context;
use loom_mesh_agent::{AgentConfig, MeshAgent};
use loom_mesh_policy::NftBackend;
use loom_mesh_route::adapter_for;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config = AgentConfig::from_env().context("failed to load agent configuration")?;
	info!(?config, "loaded configuration");

	let adapter = adapter_for(config.os);
	let backend = NftBackend::new();

	let mut agent = MeshAgent::new(config, adapter, backend);
	let handle = agent.shutdown_handle();

	tokio::spawn(async move {
		if let Err(e) = tokio::signal::ctrl_c().await {
			error!(error = %e, "failed to listen for shutdown signal");
			return;
		}
		info!("shutdown signal received");
		handle.shutdown();
	});

	agent.run().await?;
	Ok(())
}
