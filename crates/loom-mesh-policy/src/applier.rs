// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::backend::FirewallBackend;
use crate::error::PolicyError;
use crate::ruleset::{clear_script, Ruleset};
use tracing::{debug, info, instrument};

/// Applies compiled rulesets atomically and tracks the last-applied
/// one so unchanged policy is skipped rather than re-asserted.
///
/// An apply failure leaves the last-applied state untouched: a device
/// whose apply failed must not be treated as converged, and the next
/// pass retries the full replace.
pub struct RulesetApplier<B> {
	backend: B,
	last_applied: Option<Ruleset>,
}

impl<B: FirewallBackend> RulesetApplier<B> {
	pub fn new(backend: B) -> Self {
		Self {
			backend,
			last_applied: None,
		}
	}

	pub fn last_applied(&self) -> Option<&Ruleset> {
		self.last_applied.as_ref()
	}

	/// Replaces the device's chains with the compiled ruleset in one
	/// transaction. Returns false when the ruleset is structurally
	/// identical to the last applied one and nothing was issued.
	#[instrument(skip(self, ruleset), fields(rule_count = ruleset.rules.len()))]
	pub async fn apply(&mut self, ruleset: Ruleset) -> Result<bool, PolicyError> {
		if self.last_applied.as_ref() == Some(&ruleset) {
			debug!("ruleset unchanged, skipping apply");
			return Ok(false);
		}

		self.backend.apply_script(&ruleset.render()).await?;
		info!("applied ruleset");
		self.last_applied = Some(ruleset);
		Ok(true)
	}

	/// Re-applies unconditionally. Recovers the table after something
	/// external flushed it out from under the agent.
	#[instrument(skip(self, ruleset))]
	pub async fn force_apply(&mut self, ruleset: Ruleset) -> Result<(), PolicyError> {
		self.backend.apply_script(&ruleset.render()).await?;
		info!("force-applied ruleset");
		self.last_applied = Some(ruleset);
		Ok(())
	}

	/// Deletes the agent's table, restoring default-permit. Used when
	/// the owning security group is deleted or the device is
	/// disassociated. A no-op when nothing was ever applied.
	#[instrument(skip(self))]
	pub async fn clear(&mut self) -> Result<(), PolicyError> {
		if self.last_applied.is_none() {
			debug!("no ruleset applied, nothing to clear");
			return Ok(());
		}

		self.backend.apply_script(&clear_script()).await?;
		info!("cleared ruleset, default-permit restored");
		self.last_applied = None;
		Ok(())
	}

	/// Current applied table as the packet-filter subsystem reports
	/// it. This is the convergence observation surface: callers poll
	/// and compare against a pre-change snapshot.
	pub async fn snapshot(&self) -> Result<String, PolicyError> {
		self.backend.list_ruleset().await
	}
}

impl<B> std::fmt::Debug for RulesetApplier<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RulesetApplier")
			.field("has_last_applied", &self.last_applied.is_some())
			.finish()
	}
}
