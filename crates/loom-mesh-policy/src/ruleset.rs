// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_mesh_common::{IpFamily, IpSpec};
use std::fmt::Write as _;

/// The nftables table owned by the agent. Everything the agent applies
/// lives under `inet loom-mesh`; deleting this table restores the
/// host's default-permit posture.
pub const TABLE_NAME: &str = "loom-mesh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Inbound,
	Outbound,
}

impl Direction {
	pub fn chain(&self) -> &'static str {
		match self {
			Direction::Inbound => "input",
			Direction::Outbound => "output",
		}
	}

	fn hook(&self) -> &'static str {
		self.chain()
	}

	fn iface_keyword(&self) -> &'static str {
		match self {
			Direction::Inbound => "iifname",
			Direction::Outbound => "oifname",
		}
	}

	/// Inbound rules constrain where traffic comes from; outbound
	/// rules constrain where it goes.
	fn addr_keyword(&self) -> &'static str {
		match self {
			Direction::Inbound => "saddr",
			Direction::Outbound => "daddr",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoMatch {
	/// No protocol constraint.
	Any,
	Tcp,
	Udp,
	Icmpv4,
	Icmpv6,
	/// Address-family constraint only.
	Ipv4,
	Ipv6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Accept,
	Drop,
}

impl Verdict {
	fn as_str(&self) -> &'static str {
		match self {
			Verdict::Accept => "accept",
			Verdict::Drop => "drop",
		}
	}
}

/// An anonymous nftables set of address elements, all one family.
/// Ranges stay native range elements; CIDRs pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrSet {
	pub family: IpFamily,
	pub elements: Vec<IpSpec>,
}

impl AddrSet {
	fn render(&self, direction: Direction) -> String {
		let keyword = match self.family {
			IpFamily::V4 => "ip",
			IpFamily::V6 => "ip6",
		};
		let elements: Vec<String> = self.elements.iter().map(|e| e.to_string()).collect();
		format!(
			"{} {} {{ {} }}",
			keyword,
			direction.addr_keyword(),
			elements.join(", ")
		)
	}
}

/// One rendered-to-be nftables rule, scoped to the tunnel interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
	pub direction: Direction,
	pub proto: ProtoMatch,
	pub addr_set: Option<AddrSet>,
	/// Port match for TCP/UDP rules; `None` means any port.
	pub port_range: Option<(u16, u16)>,
	pub verdict: Verdict,
}

impl FilterRule {
	pub fn accept_all(direction: Direction) -> Self {
		Self {
			direction,
			proto: ProtoMatch::Any,
			addr_set: None,
			port_range: None,
			verdict: Verdict::Accept,
		}
	}

	pub fn deny_tail(direction: Direction) -> Self {
		Self {
			direction,
			proto: ProtoMatch::Any,
			addr_set: None,
			port_range: None,
			verdict: Verdict::Drop,
		}
	}

	fn render(&self, tunnel_iface: &str) -> String {
		let mut parts = vec![format!(
			"{} \"{}\"",
			self.direction.iface_keyword(),
			tunnel_iface
		)];

		let l4 = match self.proto {
			ProtoMatch::Any => None,
			ProtoMatch::Tcp => Some("tcp"),
			ProtoMatch::Udp => Some("udp"),
			ProtoMatch::Icmpv4 => {
				parts.push("meta l4proto icmp".to_string());
				None
			}
			ProtoMatch::Icmpv6 => {
				parts.push("meta l4proto ipv6-icmp".to_string());
				None
			}
			ProtoMatch::Ipv4 => {
				parts.push("meta nfproto ipv4".to_string());
				None
			}
			ProtoMatch::Ipv6 => {
				parts.push("meta nfproto ipv6".to_string());
				None
			}
		};

		// A TCP/UDP rule with no port range still constrains the
		// protocol itself.
		if let Some(l4) = l4 {
			if self.port_range.is_none() {
				parts.push(format!("meta l4proto {l4}"));
			}
		}

		if let Some(set) = &self.addr_set {
			parts.push(set.render(self.direction));
		}

		if let (Some(l4), Some((from, to))) = (l4, self.port_range) {
			if from == to {
				parts.push(format!("{l4} dport {from}"));
			} else {
				parts.push(format!("{l4} dport {from}-{to}"));
			}
		}

		parts.push(self.verdict.as_str().to_string());
		parts.join(" ")
	}
}

/// The compiled, ordered ruleset for one device: both directions'
/// chains bound to the tunnel interface. Structural equality is the
/// diffing contract the applier uses to skip unchanged policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruleset {
	pub tunnel_iface: String,
	pub rules: Vec<FilterRule>,
}

impl Ruleset {
	pub fn new(tunnel_iface: impl Into<String>) -> Self {
		Self {
			tunnel_iface: tunnel_iface.into(),
			rules: Vec::new(),
		}
	}

	pub fn rules_for(&self, direction: Direction) -> impl Iterator<Item = &FilterRule> {
		self.rules.iter().filter(move |r| r.direction == direction)
	}

	/// Renders the full nft script. The leading declare-then-delete
	/// makes the swap a single kernel transaction: the old table (if
	/// any) and the new one are exchanged atomically, so a concurrent
	/// `nft list ruleset` never observes a partial ruleset.
	pub fn render(&self) -> String {
		let mut out = String::new();
		writeln!(out, "table inet {TABLE_NAME}").unwrap();
		writeln!(out, "delete table inet {TABLE_NAME}").unwrap();
		writeln!(out, "table inet {TABLE_NAME} {{").unwrap();

		for direction in [Direction::Inbound, Direction::Outbound] {
			writeln!(out, "\tchain {} {{", direction.chain()).unwrap();
			writeln!(
				out,
				"\t\ttype filter hook {} priority filter; policy accept;",
				direction.hook()
			)
			.unwrap();
			for rule in self.rules_for(direction) {
				writeln!(out, "\t\t{}", rule.render(&self.tunnel_iface)).unwrap();
			}
			writeln!(out, "\t}}").unwrap();
		}

		writeln!(out, "}}").unwrap();
		out
	}
}

/// Script that removes the agent's table, restoring default-permit.
/// The declare-then-delete pair succeeds whether or not the table is
/// currently present.
pub fn clear_script() -> String {
	format!("table inet {TABLE_NAME}\ndelete table inet {TABLE_NAME}\n")
}
