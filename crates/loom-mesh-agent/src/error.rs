// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("fetch error: {0}")]
	Fetch(#[from] FetchError),

	#[error("policy error: {0}")]
	Policy(#[from] loom_mesh_policy::PolicyError),
}

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("URL parse error: {0}")]
	Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("missing environment variable: {0}")]
	MissingEnv(String),

	#[error("parse error: {0}")]
	Parse(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
