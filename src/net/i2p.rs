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

//! I2P b32 address value type.
//!
//! An [`I2pAddr`] owns a validated `.b32.i2p` hostname (52 base32 characters
//! plus the suffix) and a 16-bit port. Structurally identical to
//! [`crate::net::tor::TorAddr`] but kept as a distinct type since the two
//! namespaces are never interchangeable.

use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Length of a b32.i2p host, including the `.b32.i2p` suffix.
pub const I2P_HOST_LEN: usize = 60;

const I2P_SUFFIX: &str = ".b32.i2p";

/// Sentinel host string standing in for "no valid I2P address known".
pub const UNKNOWN_I2P_HOST: &str = "<unknown i2p host>";

const ARCHIVE_VERSION: u8 = 1;

/// Errors produced while constructing or validating an [`I2pAddr`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum I2pAddrError {
    /// invalid i2p address
    InvalidAddress,

    /// invalid port
    InvalidPort,
}

/// An I2P b32 address and port.
///
/// Construct with [`I2pAddr::make`]; the [`Default`] instance (and
/// [`I2pAddr::unknown`]) is the distinguished "no address known" sentinel.
#[derive(Clone, Debug, Eq, Hash)]
pub struct I2pAddr {
    host: String,
    port: u16,
}

impl I2pAddr {
    /// Parses `text` as `host[:port]`, falling back to `default_port` when no
    /// port suffix is present.
    pub fn make(text: &str, default_port: u16) -> Result<Self, I2pAddrError> {
        let (host, port) = match text.rfind(':') {
            Some(idx) => {
                let port = text[idx + 1..]
                    .parse::<u16>()
                    .map_err(|_| I2pAddrError::InvalidPort)?;
                (&text[..idx], port)
            }
            None => (text, default_port),
        };
        validate_host(host)?;
        Ok(I2pAddr {
            host: host.to_owned(),
            port,
        })
    }

    /// The distinguished "no address known" sentinel: host is
    /// [`UNKNOWN_I2P_HOST`], port is `0`.
    pub fn unknown() -> Self {
        I2pAddr {
            host: UNKNOWN_I2P_HOST.to_owned(),
            port: 0,
        }
    }

    /// True iff this is the unknown sentinel.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.host == UNKNOWN_I2P_HOST
    }

    /// True for any validly-parsed address; false for the unknown sentinel.
    #[inline]
    pub fn is_blockable(&self) -> bool {
        !self.is_unknown()
    }

    /// Always `false`: I2P addresses never denote a local or loopback host.
    #[inline]
    pub const fn is_local(&self) -> bool {
        false
    }

    /// Always `false`: I2P addresses never denote a local or loopback host.
    #[inline]
    pub const fn is_loopback(&self) -> bool {
        false
    }

    /// The validated host string, or [`UNKNOWN_I2P_HOST`] for the sentinel.
    #[inline]
    pub fn host_str(&self) -> &str {
        &self.host
    }

    /// The port; `0` means unspecified.
    #[inline]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// True iff `self` and `other` name the same host, ignoring port.
    #[inline]
    pub fn is_same_host(&self, other: &Self) -> bool {
        self.host == other.host
    }

    /// Textual presentation: `host` if port is `0`, `host:port` otherwise.
    pub fn str(&self) -> String {
        if self.port == 0 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for I2pAddr {
    fn default() -> Self {
        I2pAddr::unknown()
    }
}

impl PartialEq for I2pAddr {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl PartialOrd for I2pAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I2pAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        // See TorAddr::cmp: the sentinel must order as minimum regardless of
        // its literal bytes, since base32 digits '2'-'7' are lower in ASCII
        // than the sentinel's leading '<'.
        match (self.is_unknown(), other.is_unknown()) {
            (true, true) => self.port.cmp(&other.port),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.host.cmp(&other.host).then(self.port.cmp(&other.port)),
        }
    }
}

impl fmt::Display for I2pAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.str())
    }
}

impl FromStr for I2pAddr {
    type Err = I2pAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        I2pAddr::make(s, 0)
    }
}

/// Validates that `host` is exactly a b32.i2p address: 52 base32 characters
/// followed by `.b32.i2p`, with no stray bytes.
fn validate_host(host: &str) -> Result<(), I2pAddrError> {
    if host.len() != I2P_HOST_LEN || !host.ends_with(I2P_SUFFIX) {
        return Err(I2pAddrError::InvalidAddress);
    }
    let body_len = I2P_HOST_LEN - I2P_SUFFIX.len();
    let body = &host.as_bytes()[..body_len];
    if !body
        .iter()
        .all(|&b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
    {
        return Err(I2pAddrError::InvalidAddress);
    }
    Ok(())
}

// ---- self-describing keyed wire format (§4.1) ----

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct I2pAddrRepr {
    host: String,
    port: u32,
}

#[cfg(feature = "serde")]
impl From<I2pAddrRepr> for I2pAddr {
    fn from(repr: I2pAddrRepr) -> Self {
        let port = match u16::try_from(repr.port) {
            Ok(port) => port,
            Err(_) => return I2pAddr::unknown(),
        };
        if repr.host.len() > I2P_HOST_LEN || validate_host(&repr.host).is_err() {
            log::warn!(target: "stem_net::sanitize", "discarding invalid i2p host on load");
            return I2pAddr::unknown();
        }
        I2pAddr {
            host: repr.host,
            port,
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for I2pAddr {
    fn serialize<S: serde_crate::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde_crate::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            "i2p",
            &I2pAddrRepr {
                host: self.host.clone(),
                port: self.port as u32,
            },
        )?;
        map.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for I2pAddr {
    fn deserialize<D: serde_crate::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Keyed {
            i2p: I2pAddrRepr,
        }
        Ok(Keyed::deserialize(deserializer)?.i2p.into())
    }
}

// ---- binary archival format (§4.1, §6) ----

impl I2pAddr {
    /// Encodes `self` as `[version: u8][host_len: u16][host bytes][port: u16]`.
    pub fn strict_encode<W: io::Write>(&self, mut w: W) -> io::Result<usize> {
        let mut len = 0;
        len += w.write(&[ARCHIVE_VERSION])?;
        let host_bytes = self.host.as_bytes();
        len += w.write(&(host_bytes.len() as u16).to_be_bytes())?;
        len += w.write(host_bytes)?;
        len += w.write(&self.port.to_be_bytes())?;
        Ok(len)
    }

    /// Decodes the format written by [`I2pAddr::strict_encode`]. A declared
    /// host length exceeding [`I2P_HOST_LEN`] is drained from the stream in
    /// bounded chunks and yields the unknown sentinel rather than an error.
    pub fn strict_decode<R: io::Read>(mut r: R) -> io::Result<Self> {
        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;

        let mut host_len_buf = [0u8; 2];
        r.read_exact(&mut host_len_buf)?;
        let host_len = u16::from_be_bytes(host_len_buf) as usize;

        let host = if host_len > I2P_HOST_LEN {
            drain_bounded(&mut r, host_len)?;
            None
        } else {
            let mut buf = vec![0u8; host_len];
            r.read_exact(&mut buf)?;
            String::from_utf8(buf).ok()
        };

        let mut port_buf = [0u8; 2];
        r.read_exact(&mut port_buf)?;
        let port = u16::from_be_bytes(port_buf);

        match host {
            Some(host) if validate_host(&host).is_ok() => Ok(I2pAddr { host, port }),
            _ => {
                log::warn!(target: "stem_net::sanitize", "discarding invalid i2p host on load");
                Ok(I2pAddr::unknown())
            }
        }
    }
}

fn drain_bounded<R: io::Read>(r: &mut R, mut len: usize) -> io::Result<()> {
    let mut scratch = [0u8; 256];
    while len > 0 {
        let take = len.min(scratch.len());
        r.read_exact(&mut scratch[..take])?;
        len -= take;
    }
    Ok(())
}
