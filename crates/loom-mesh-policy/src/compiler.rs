// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::PolicyError;
use crate::ruleset::{AddrSet, Direction, FilterRule, ProtoMatch, Ruleset, Verdict};
use loom_mesh_common::{IpFamily, IpSpec, SecurityGroup, SecurityProtocol, SecurityRule};
use tracing::{debug, instrument};

/// Compiles a security group into the ruleset to apply for a device.
///
/// Deterministic: the same group always compiles to the same ruleset,
/// which is what makes the applier's structural diff a meaningful
/// idempotence check. A malformed rule fails the whole compilation;
/// partially-honored policy must never reach the kernel.
#[instrument(skip(group), fields(group_id = %group.id))]
pub fn compile(tunnel_iface: &str, group: &SecurityGroup) -> Result<Ruleset, PolicyError> {
	let mut ruleset = Ruleset::new(tunnel_iface);

	compile_direction(&mut ruleset, Direction::Inbound, &group.inbound_rules)?;
	compile_direction(&mut ruleset, Direction::Outbound, &group.outbound_rules)?;

	debug!(rule_count = ruleset.rules.len(), "compiled security group");
	Ok(ruleset)
}

fn compile_direction(
	ruleset: &mut Ruleset,
	direction: Direction,
	rules: &[SecurityRule],
) -> Result<(), PolicyError> {
	// No declared rules means permissive in that direction, which is
	// not the same as a group-less device (no table at all).
	if rules.is_empty() {
		ruleset.rules.push(FilterRule::accept_all(direction));
		return Ok(());
	}

	for rule in rules {
		compile_rule(ruleset, direction, rule)?;
	}

	// Explicit accept rules are independent ORed conditions; the deny
	// tail must always come last.
	ruleset.rules.push(FilterRule::deny_tail(direction));
	Ok(())
}

fn compile_rule(
	ruleset: &mut Ruleset,
	direction: Direction,
	rule: &SecurityRule,
) -> Result<(), PolicyError> {
	let port_range = port_range_for(rule)?;

	let mut specs = Vec::new();
	for range in rule.effective_ranges() {
		specs.push(IpSpec::parse(range)?);
	}

	if specs.is_empty() {
		// Match any source/destination for this protocol.
		ruleset.rules.push(FilterRule {
			direction,
			proto: proto_match_for(rule.protocol),
			addr_set: None,
			port_range,
			verdict: Verdict::Accept,
		});
		return Ok(());
	}

	// A rule's specifiers each carry their own family; one nft rule is
	// emitted per family present. ICMP and blanket-family protocols
	// only ever take the specifiers of their own family.
	for family in [IpFamily::V4, IpFamily::V6] {
		let elements: Vec<IpSpec> = specs
			.iter()
			.filter(|s| s.family() == family)
			.cloned()
			.collect();
		if elements.is_empty() {
			continue;
		}
		if !family_applies(rule.protocol, family) {
			continue;
		}

		ruleset.rules.push(FilterRule {
			direction,
			proto: proto_match_for(rule.protocol),
			addr_set: Some(AddrSet { family, elements }),
			port_range,
			verdict: Verdict::Accept,
		});
	}

	Ok(())
}

/// TCP/UDP carry an optional port-range match; 0/0 is "any port". The
/// other protocols ignore port fields entirely.
fn port_range_for(rule: &SecurityRule) -> Result<Option<(u16, u16)>, PolicyError> {
	match rule.protocol {
		SecurityProtocol::Tcp | SecurityProtocol::Udp => {
			if rule.any_port() {
				Ok(None)
			} else if rule.to_port != 0 && rule.from_port > rule.to_port {
				Err(PolicyError::InvalidPortRange {
					from: rule.from_port,
					to: rule.to_port,
				})
			} else if rule.to_port == 0 {
				Ok(Some((rule.from_port, rule.from_port)))
			} else {
				Ok(Some((rule.from_port, rule.to_port)))
			}
		}
		_ => Ok(None),
	}
}

fn family_applies(protocol: SecurityProtocol, family: IpFamily) -> bool {
	match protocol {
		SecurityProtocol::Icmpv4 | SecurityProtocol::Ipv4 => family == IpFamily::V4,
		SecurityProtocol::Icmpv6 | SecurityProtocol::Ipv6 => family == IpFamily::V6,
		_ => true,
	}
}

fn proto_match_for(protocol: SecurityProtocol) -> ProtoMatch {
	match protocol {
		SecurityProtocol::Tcp => ProtoMatch::Tcp,
		SecurityProtocol::Udp => ProtoMatch::Udp,
		SecurityProtocol::Icmpv4 => ProtoMatch::Icmpv4,
		SecurityProtocol::Icmpv6 => ProtoMatch::Icmpv6,
		SecurityProtocol::Ipv4 => ProtoMatch::Ipv4,
		SecurityProtocol::Ipv6 => ProtoMatch::Ipv6,
		SecurityProtocol::All => ProtoMatch::Any,
	}
}
