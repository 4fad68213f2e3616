// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
	#[error("invalid address: {0}")]
	InvalidAddress(String),

	#[error("invalid CIDR: {0}")]
	InvalidCidr(String),

	#[error("invalid range: {0}")]
	InvalidRange(String),

	#[error("range endpoints have mixed address families: {0}")]
	MixedFamilyRange(String),

	#[error("range start is after range end: {0}")]
	InvertedRange(String),
}
