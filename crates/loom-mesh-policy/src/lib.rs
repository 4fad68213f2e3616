// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Security-group policy compilation and enforcement.
//!
//! This crate provides:
//! - [`compile`]: a deterministic function from a security group to a
//!   structured nftables [`Ruleset`] (anonymous sets with native range
//!   elements, per-protocol port matches, default-deny tails)
//! - [`RulesetApplier`]: atomic flush-and-reload application over a
//!   [`FirewallBackend`], with in-memory diffing against the
//!   last-applied ruleset so unchanged policy is never re-asserted
//!
//! Convergence is externally observable only by reading the applied
//! ruleset back; there is no "done" callback.

mod applier;
mod backend;
mod compiler;
mod error;
mod ruleset;

pub use applier::RulesetApplier;
pub use backend::{FirewallBackend, NftBackend};
pub use compiler::compile;
pub use error::{PolicyError, Result};
pub use ruleset::{AddrSet, Direction, FilterRule, ProtoMatch, Ruleset, Verdict, TABLE_NAME};
