// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::SpecError;
use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
	V4,
	V6,
}

/// A parsed address specifier from a security rule's `ipRanges` field.
///
/// The grammar accepts exactly three forms: a bare IP, a CIDR, or an
/// inclusive range `A-B` where both ends share an address family. Each
/// specifier carries its own family; a single rule may mix families
/// across specifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IpSpec {
	Addr(IpAddr),
	Cidr(IpNet),
	Range(IpAddr, IpAddr),
}

impl IpSpec {
	pub fn parse(s: &str) -> Result<Self, SpecError> {
		let s = s.trim();

		if s.contains('/') {
			let net: IpNet = s
				.parse()
				.map_err(|_| SpecError::InvalidCidr(s.to_string()))?;
			return Ok(IpSpec::Cidr(net));
		}

		// IPv6 uses ':' separators, so '-' only ever delimits a range.
		if let Some((start, end)) = s.split_once('-') {
			let start: IpAddr = start
				.trim()
				.parse()
				.map_err(|_| SpecError::InvalidRange(s.to_string()))?;
			let end: IpAddr = end
				.trim()
				.parse()
				.map_err(|_| SpecError::InvalidRange(s.to_string()))?;

			match (start, end) {
				(IpAddr::V4(a), IpAddr::V4(b)) if a > b => {
					return Err(SpecError::InvertedRange(s.to_string()));
				}
				(IpAddr::V6(a), IpAddr::V6(b)) if a > b => {
					return Err(SpecError::InvertedRange(s.to_string()));
				}
				(IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {}
				_ => return Err(SpecError::MixedFamilyRange(s.to_string())),
			}

			return Ok(IpSpec::Range(start, end));
		}

		let addr: IpAddr = s
			.parse()
			.map_err(|_| SpecError::InvalidAddress(s.to_string()))?;
		Ok(IpSpec::Addr(addr))
	}

	pub fn family(&self) -> IpFamily {
		let is_v4 = match self {
			IpSpec::Addr(addr) => addr.is_ipv4(),
			IpSpec::Cidr(net) => matches!(net, IpNet::V4(_)),
			IpSpec::Range(start, _) => start.is_ipv4(),
		};
		if is_v4 {
			IpFamily::V4
		} else {
			IpFamily::V6
		}
	}
}

impl fmt::Display for IpSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IpSpec::Addr(addr) => write!(f, "{addr}"),
			IpSpec::Cidr(net) => write!(f, "{net}"),
			IpSpec::Range(start, end) => write!(f, "{start}-{end}"),
		}
	}
}

impl std::str::FromStr for IpSpec {
	type Err = SpecError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_parse_bare_ip() {
		let spec = IpSpec::parse("192.168.168.100").unwrap();
		assert_eq!(spec, IpSpec::Addr("192.168.168.100".parse().unwrap()));
		assert_eq!(spec.family(), IpFamily::V4);
	}

	#[test]
	fn test_parse_bare_ipv6() {
		let spec = IpSpec::parse("2001::10").unwrap();
		assert_eq!(spec.family(), IpFamily::V6);
	}

	#[test]
	fn test_parse_cidr() {
		let spec = IpSpec::parse("100.64.0.0/10").unwrap();
		assert_eq!(spec.to_string(), "100.64.0.0/10");
		assert_eq!(spec.family(), IpFamily::V4);

		let spec = IpSpec::parse("200::/64").unwrap();
		assert_eq!(spec.to_string(), "200::/64");
		assert_eq!(spec.family(), IpFamily::V6);
	}

	#[test]
	fn test_parse_range() {
		let spec = IpSpec::parse("172.28.100.1-172.28.100.101").unwrap();
		match &spec {
			IpSpec::Range(start, end) => {
				assert_eq!(start.to_string(), "172.28.100.1");
				assert_eq!(end.to_string(), "172.28.100.101");
			}
			other => panic!("expected range, got {other:?}"),
		}
		assert_eq!(spec.to_string(), "172.28.100.1-172.28.100.101");
	}

	#[test]
	fn test_parse_ipv6_range() {
		let spec = IpSpec::parse("200::1-200::ffff:ffff:ffff:ffff").unwrap();
		assert_eq!(spec.family(), IpFamily::V6);
	}

	#[test]
	fn test_inverted_range_rejected() {
		let err = IpSpec::parse("172.28.100.101-172.28.100.1").unwrap_err();
		assert!(matches!(err, SpecError::InvertedRange(_)));
	}

	#[test]
	fn test_mixed_family_range_rejected() {
		let err = IpSpec::parse("172.28.100.1-200::1").unwrap_err();
		assert!(matches!(err, SpecError::MixedFamilyRange(_)));
	}

	#[test]
	fn test_single_address_range_allowed() {
		let spec = IpSpec::parse("10.0.0.1-10.0.0.1").unwrap();
		assert!(matches!(spec, IpSpec::Range(_, _)));
	}

	#[test]
	fn test_garbage_rejected() {
		assert!(IpSpec::parse("not-an-address").is_err());
		assert!(IpSpec::parse("10.0.0.0/33").is_err());
		assert!(IpSpec::parse("").is_err());
	}

	proptest! {
		#[test]
		fn prop_v4_addr_roundtrip(a: u8, b: u8, c: u8, d: u8) {
			let s = format!("{a}.{b}.{c}.{d}");
			let spec = IpSpec::parse(&s).unwrap();
			prop_assert_eq!(spec.to_string(), s);
			prop_assert_eq!(spec.family(), IpFamily::V4);
		}

		#[test]
		fn prop_v4_range_order(a: u32, b: u32) {
			let start = std::net::Ipv4Addr::from(a.min(b));
			let end = std::net::Ipv4Addr::from(a.max(b));
			let spec = IpSpec::parse(&format!("{start}-{end}")).unwrap();
			prop_assert!(matches!(spec, IpSpec::Range(_, _)));

			if a != b {
				let inverted = format!("{end}-{start}");
				prop_assert!(IpSpec::parse(&inverted).is_err());
			}
		}

		#[test]
		fn prop_v4_cidr_roundtrip(a: u8, b: u8, prefix in 0u8..=32) {
			let s = format!("{a}.{b}.0.0/{prefix}");
			let spec = IpSpec::parse(&s).unwrap();
			prop_assert_eq!(spec.to_string(), s);
		}
	}
}
