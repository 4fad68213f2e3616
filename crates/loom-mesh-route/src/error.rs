// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
	#[error("{cmd} {} failed: {stderr}", args.join(" "))]
	CommandFailed {
		cmd: &'static str,
		args: Vec<String>,
		stderr: String,
	},

	#[error("{0} not found in PATH")]
	NotInstalled(&'static str),

	#[error("failed to resolve interface for address {0}")]
	InterfaceResolution(String),

	#[error("operation not supported on this OS: {0}")]
	Unsupported(&'static str),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouteError>;
