// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Common types for the mesh overlay agent.
//!
//! Pure data: the desired-state model fetched from the control plane
//! (endpoints, peer configurations, security groups) and the address
//! specifier grammar shared by the route and policy crates. No behavior
//! beyond parsing and selection helpers lives here.

mod endpoint;
mod error;
mod ipspec;
mod peer;
mod rule;
mod state;

pub use endpoint::{local_endpoint, reflexive_endpoints, Endpoint, EndpointSource};
pub use error::SpecError;
pub use ipspec::{IpFamily, IpSpec};
pub use peer::PeerConfig;
pub use rule::{SecurityGroup, SecurityProtocol, SecurityRule};
pub use state::DeviceState;
