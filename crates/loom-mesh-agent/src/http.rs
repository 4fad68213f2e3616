// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP client construction with a consistent User-Agent.

use reqwest::Client;
use std::time::Duration;

/// Creates the control-plane HTTP client. The timeout bounds the
/// fetch call only; local OS mutations are never subject to it.
pub fn new_client(timeout: Duration) -> Client {
	Client::builder()
		.user_agent(user_agent())
		.timeout(timeout)
		.build()
		.expect("failed to build HTTP client")
}

/// Format: `loom-mesh/{version}`.
pub fn user_agent() -> String {
	format!("loom-mesh/{}", env!("CARGO_PKG_VERSION"))
}
