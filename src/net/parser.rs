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

//! Endpoint parser: classifies a textual `host[:port]` endpoint and
//! dispatches it to the matching address constructor.

use std::net::{Ipv4Addr, SocketAddrV4};

use super::{I2pAddr, NetAddr, TorAddr};

const ONION_SUFFIX: &str = ".onion";
const I2P_SUFFIX: &str = ".b32.i2p";

/// Errors surfaced by [`get_network_address`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum NetAddrParseError {
    /// endpoint does not match any known address format
    UnsupportedAddress,

    /// invalid tor address
    InvalidTorAddress,

    /// invalid i2p address
    InvalidI2pAddress,

    /// invalid port
    InvalidPort,
}

/// Classifies `text` and parses it into a [`NetAddr`], trying Tor, then I2P,
/// then dotted-quad IPv4, in that order. `default_port` is used for any
/// variant whose textual form omits a `:port` suffix.
pub fn get_network_address(
    text: &str,
    default_port: u16,
) -> Result<NetAddr, NetAddrParseError> {
    // None of the host forms this parser knows about ever contain a colon,
    // so the suffix check looks past an optional trailing ":port" the same
    // way `TorAddr::make`/`I2pAddr::make` do. `ends_with` on the host part
    // alone is enough to separate the three cases the spec calls out: a
    // bare "onion"/"i2p" label is shorter than the dotted suffix and so
    // never matches here (falls through to unsupported); a present-but-
    // empty label (".onion") does match here and is left for the Tor/I2P
    // constructor to reject as invalid; a trailing-dot form with no label
    // (e.g. "onion.") doesn't end with the dotted suffix either.
    let host = host_part(text);
    if host.ends_with(ONION_SUFFIX) {
        return TorAddr::make(text, default_port)
            .map(NetAddr::Tor)
            .map_err(|e| match e {
                super::TorAddrError::InvalidPort => NetAddrParseError::InvalidPort,
                super::TorAddrError::InvalidAddress => {
                    NetAddrParseError::InvalidTorAddress
                }
            });
    }
    if host.ends_with(I2P_SUFFIX) {
        return I2pAddr::make(text, default_port)
            .map(NetAddr::I2p)
            .map_err(|e| match e {
                super::I2pAddrError::InvalidPort => NetAddrParseError::InvalidPort,
                super::I2pAddrError::InvalidAddress => {
                    NetAddrParseError::InvalidI2pAddress
                }
            });
    }
    if let Some(addr) = parse_ipv4(text, default_port)? {
        return Ok(NetAddr::IPv4(addr));
    }
    Err(NetAddrParseError::UnsupportedAddress)
}

/// Strips an optional trailing `:<port>` suffix, mirroring the split
/// `TorAddr::make`/`I2pAddr::make` perform internally.
fn host_part(text: &str) -> &str {
    match text.rfind(':') {
        Some(idx) => &text[..idx],
        None => text,
    }
}

fn parse_ipv4(text: &str, default_port: u16) -> Result<Option<SocketAddrV4>, NetAddrParseError> {
    let (host, port) = match text.rfind(':') {
        Some(idx) if text[..idx].contains('.') => {
            let port = text[idx + 1..]
                .parse::<u16>()
                .map_err(|_| NetAddrParseError::InvalidPort)?;
            (&text[..idx], port)
        }
        _ => (text, default_port),
    };
    match host.parse::<Ipv4Addr>() {
        Ok(ip) => Ok(Some(SocketAddrV4::new(ip, port))),
        Err(_) => Ok(None),
    }
}
