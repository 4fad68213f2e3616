// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_mesh_common::SpecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
	#[error("malformed rule: {0}")]
	Spec(#[from] SpecError),

	#[error("invalid port range {from}-{to}")]
	InvalidPortRange { from: u16, to: u16 },

	#[error("nft {} failed: {stderr}", args.join(" "))]
	Backend { args: Vec<String>, stderr: String },

	#[error("nft not found in PATH")]
	NotInstalled,

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
