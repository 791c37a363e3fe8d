// Stem-net: Dandelion++ stem routing and anonymity-network address types
// Written in 2019-2024 by the project contributors
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

#![recursion_limit = "256"]
// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    //missing_docs
)]

//! Dandelion++ stem routing and Tor/I2P/IPv4 address value types for a
//! privacy-preserving peer-to-peer node.
//!
//! [`net`] holds the address value types (`TorAddr`, `I2pAddr`, the
//! `NetAddr` tagged union, and the endpoint parser); [`dandelion`] holds the
//! stem-side connection map that assigns inbound sources to outbound stem
//! peers.

#[macro_use]
extern crate amplify;

#[cfg(feature = "serde")]
extern crate serde_crate as serde;

pub mod dandelion;
pub mod net;

pub use dandelion::ConnectionMap;
pub use net::{
    get_network_address, I2pAddr, I2pAddrError, NetAddr, NetAddrKind,
    NetAddrParseError, TorAddr, TorAddrError, Zone,
};
