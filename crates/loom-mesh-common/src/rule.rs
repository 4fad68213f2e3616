// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Protocol selector for a security rule.
///
/// `Ipv4`/`Ipv6` constrain only the address family (blanket family
/// rules); `Icmpv4`/`Icmpv6` restrict to the ICMP protocol of that
/// family and ignore port fields; `All` (or an absent/empty protocol
/// string on the wire) matches every protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityProtocol {
	Tcp,
	Udp,
	Icmpv4,
	Icmpv6,
	Ipv4,
	Ipv6,
	All,
}

impl SecurityProtocol {
	pub fn as_str(&self) -> &'static str {
		match self {
			SecurityProtocol::Tcp => "tcp",
			SecurityProtocol::Udp => "udp",
			SecurityProtocol::Icmpv4 => "icmpv4",
			SecurityProtocol::Icmpv6 => "icmpv6",
			SecurityProtocol::Ipv4 => "ipv4",
			SecurityProtocol::Ipv6 => "ipv6",
			SecurityProtocol::All => "all",
		}
	}
}

impl Serialize for SecurityProtocol {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for SecurityProtocol {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		match s.as_str() {
			"tcp" => Ok(SecurityProtocol::Tcp),
			"udp" => Ok(SecurityProtocol::Udp),
			"icmpv4" => Ok(SecurityProtocol::Icmpv4),
			"icmpv6" => Ok(SecurityProtocol::Icmpv6),
			"ipv4" => Ok(SecurityProtocol::Ipv4),
			"ipv6" => Ok(SecurityProtocol::Ipv6),
			"all" | "" => Ok(SecurityProtocol::All),
			other => Err(D::Error::custom(format!("unknown protocol: {other}"))),
		}
	}
}

impl Default for SecurityProtocol {
	fn default() -> Self {
		SecurityProtocol::All
	}
}

/// Port fields travel as string-encoded integers on the wire.
mod port_string {
	use super::*;

	pub fn serialize<S: Serializer>(port: &u16, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&port.to_string())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse()
			.map_err(|_| D::Error::custom(format!("invalid port: {s}")))
	}
}

/// One declarative security-group rule.
///
/// Port 0 means "any port". An empty `ip_ranges` list (or an empty
/// string entry) means "match any address" for the rule's direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
	#[serde(default)]
	pub protocol: SecurityProtocol,
	#[serde(rename = "fromPort", with = "port_string")]
	pub from_port: u16,
	#[serde(rename = "toPort", with = "port_string")]
	pub to_port: u16,
	#[serde(rename = "ipRanges", default)]
	pub ip_ranges: Vec<String>,
}

impl SecurityRule {
	pub fn new(protocol: SecurityProtocol, from_port: u16, to_port: u16, ip_ranges: Vec<String>) -> Self {
		Self {
			protocol,
			from_port,
			to_port,
			ip_ranges,
		}
	}

	/// True when the rule matches every port (both fields zero).
	pub fn any_port(&self) -> bool {
		self.from_port == 0 && self.to_port == 0
	}

	/// Address specifiers with "match anything" placeholders removed.
	pub fn effective_ranges(&self) -> Vec<&str> {
		self
			.ip_ranges
			.iter()
			.map(|r| r.trim())
			.filter(|r| !r.is_empty())
			.collect()
	}
}

/// An organization-scoped bundle of inbound/outbound rules applied to
/// every device that references it.
///
/// Rule order does not affect matching (rules are independently ORed)
/// but is preserved so re-applying an unchanged group diffs stably.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
	pub id: String,
	pub organization_id: String,
	#[serde(default)]
	pub inbound_rules: Vec<SecurityRule>,
	#[serde(default)]
	pub outbound_rules: Vec<SecurityRule>,
}
