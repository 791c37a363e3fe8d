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

//! Tor v2/v3 onion address value type.
//!
//! A [`TorAddr`] owns a validated onion hostname (16 base32 chars for v2, 56
//! for v3, each followed by `.onion`) plus a 16-bit port. It never performs
//! Tor cryptography or hostname resolution — it only parses, validates,
//! orders and (de)serializes the textual form a transport hands it.

use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Length of a v2 onion host, including the `.onion` suffix.
pub const TOR_V2_HOST_LEN: usize = 22;
/// Length of a v3 onion host, including the `.onion` suffix.
pub const TOR_V3_HOST_LEN: usize = 62;

const ONION_SUFFIX: &str = ".onion";

/// Sentinel host string standing in for "no valid Tor address known".
pub const UNKNOWN_TOR_HOST: &str = "<unknown tor host>";

/// Version tag written as the first byte of the archival binary encoding.
const ARCHIVE_VERSION: u8 = 1;

/// Errors produced while constructing or validating a [`TorAddr`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum TorAddrError {
    /// invalid tor address
    InvalidAddress,

    /// invalid port
    InvalidPort,
}

/// A Tor v2 or v3 onion address and port.
///
/// Construct with [`TorAddr::make`]; the [`Default`] instance (and
/// [`TorAddr::unknown`]) is the distinguished "no address known" sentinel,
/// which is never reachable through `make` since the sentinel string does
/// not end in `.onion`.
#[derive(Clone, Debug, Eq, Hash)]
pub struct TorAddr {
    host: String,
    port: u16,
}

impl TorAddr {
    /// Parses `text` as `host[:port]`, falling back to `default_port` when no
    /// port suffix is present.
    pub fn make(text: &str, default_port: u16) -> Result<Self, TorAddrError> {
        let (host, port) = match text.rfind(':') {
            Some(idx) => {
                let port = text[idx + 1..]
                    .parse::<u16>()
                    .map_err(|_| TorAddrError::InvalidPort)?;
                (&text[..idx], port)
            }
            None => (text, default_port),
        };
        validate_host(host)?;
        Ok(TorAddr {
            host: host.to_owned(),
            port,
        })
    }

    /// The distinguished "no address known" sentinel: host is
    /// [`UNKNOWN_TOR_HOST`], port is `0`.
    pub fn unknown() -> Self {
        TorAddr {
            host: UNKNOWN_TOR_HOST.to_owned(),
            port: 0,
        }
    }

    /// True iff this is the unknown sentinel.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.host == UNKNOWN_TOR_HOST
    }

    /// True for any validly-parsed address; false for the unknown sentinel.
    #[inline]
    pub fn is_blockable(&self) -> bool {
        !self.is_unknown()
    }

    /// Always `false`: Tor addresses never denote a local or loopback host.
    #[inline]
    pub const fn is_local(&self) -> bool {
        false
    }

    /// Always `false`: Tor addresses never denote a local or loopback host.
    #[inline]
    pub const fn is_loopback(&self) -> bool {
        false
    }

    /// The validated host string, or [`UNKNOWN_TOR_HOST`] for the sentinel.
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

impl Default for TorAddr {
    fn default() -> Self {
        TorAddr::unknown()
    }
}

impl PartialEq for TorAddr {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl PartialOrd for TorAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TorAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        // The sentinel orders before every valid onion host regardless of its
        // literal bytes: the base32 alphabet includes digits '2'-'7', which
        // are lower in ASCII than the sentinel's leading '<', so a plain
        // byte-wise host comparison would not guarantee this.
        match (self.is_unknown(), other.is_unknown()) {
            (true, true) => self.port.cmp(&other.port),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.host.cmp(&other.host).then(self.port.cmp(&other.port)),
        }
    }
}

impl fmt::Display for TorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.str())
    }
}

impl FromStr for TorAddr {
    type Err = TorAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TorAddr::make(s, 0)
    }
}

/// Validates that `host` is exactly a v2 or v3 onion address: base32 body of
/// the expected length followed by `.onion`, with no stray bytes.
fn validate_host(host: &str) -> Result<(), TorAddrError> {
    let body_len = match host.len() {
        TOR_V2_HOST_LEN => TOR_V2_HOST_LEN - ONION_SUFFIX.len(),
        TOR_V3_HOST_LEN => TOR_V3_HOST_LEN - ONION_SUFFIX.len(),
        _ => return Err(TorAddrError::InvalidAddress),
    };
    if !host.ends_with(ONION_SUFFIX) {
        return Err(TorAddrError::InvalidAddress);
    }
    let body = &host.as_bytes()[..body_len];
    if !body
        .iter()
        .all(|&b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
    {
        return Err(TorAddrError::InvalidAddress);
    }
    Ok(())
}

// ---- self-describing keyed wire format (§4.1) ----
//
// `TorAddr` serializes as a single-entry map `{"tor": {host, port}}` rather
// than a bare `{host, port}` object: the section name carries the address
// kind, matching the keyed wire format used for on-disk peer lists. `port`
// is carried as `u32` on the wire so an out-of-range value deserializes
// successfully (as data to sanitize) instead of failing the whole load.

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct TorAddrRepr {
    host: String,
    port: u32,
}

#[cfg(feature = "serde")]
impl From<TorAddrRepr> for TorAddr {
    fn from(repr: TorAddrRepr) -> Self {
        let port = match u16::try_from(repr.port) {
            Ok(port) => port,
            Err(_) => return TorAddr::unknown(),
        };
        if repr.host.len() > TOR_V3_HOST_LEN || validate_host(&repr.host).is_err() {
            log::warn!(target: "stem_net::sanitize", "discarding invalid tor host on load");
            return TorAddr::unknown();
        }
        TorAddr {
            host: repr.host,
            port,
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for TorAddr {
    fn serialize<S: serde_crate::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde_crate::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            "tor",
            &TorAddrRepr {
                host: self.host.clone(),
                port: self.port as u32,
            },
        )?;
        map.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for TorAddr {
    fn deserialize<D: serde_crate::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Keyed {
            tor: TorAddrRepr,
        }
        Ok(Keyed::deserialize(deserializer)?.tor.into())
    }
}

// ---- binary archival format (§4.1, §6) ----

impl TorAddr {
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

    /// Decodes the format written by [`TorAddr::strict_encode`]. A declared
    /// host length exceeding [`TOR_V3_HOST_LEN`] is drained from the stream
    /// in bounded chunks (never allocated proportionally to the untrusted
    /// length) and yields the unknown sentinel rather than an error.
    pub fn strict_decode<R: io::Read>(mut r: R) -> io::Result<Self> {
        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;

        let mut host_len_buf = [0u8; 2];
        r.read_exact(&mut host_len_buf)?;
        let host_len = u16::from_be_bytes(host_len_buf) as usize;

        let host = if host_len > TOR_V3_HOST_LEN {
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
            Some(host) if validate_host(&host).is_ok() => Ok(TorAddr { host, port }),
            _ => {
                log::warn!(target: "stem_net::sanitize", "discarding invalid tor host on load");
                Ok(TorAddr::unknown())
            }
        }
    }
}

/// Reads and discards exactly `len` bytes from `r` using a small fixed-size
/// scratch buffer, so `len` supplied by an untrusted peer cannot force an
/// allocation proportional to it.
fn drain_bounded<R: io::Read>(r: &mut R, mut len: usize) -> io::Result<()> {
    let mut scratch = [0u8; 256];
    while len > 0 {
        let take = len.min(scratch.len());
        r.read_exact(&mut scratch[..take])?;
        len -= take;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const V3_HOST: &str =
        "vww6ybal4bd7szmgncyruucpgfkqahzddi37ktceo3ah7ngmcopnpyyd.onion";
    const V2_HOST: &str = "aaaaaaaaaaaaaaaa.onion";

    #[test]
    fn parses_valid_v3_with_port() {
        let addr = TorAddr::make(V3_HOST, 9050).unwrap();
        assert_eq!(addr.port(), 9050);
        assert_eq!(addr.host_str(), V3_HOST);
        assert!(addr.is_blockable());
    }

    #[test]
    fn str_round_trip_scenario_1() {
        let addr = TorAddr::make(&format!("{V3_HOST}:8080"), 0).unwrap();
        assert_eq!(
            addr.str(),
            "vww6ybal4bd7szmgncyruucpgfkqahzddi37ktceo3ah7ngmcopnpyyd.onion:8080"
        );
        assert!(addr.is_blockable());
    }

    #[test]
    fn parses_valid_v2() {
        let addr = TorAddr::make(V2_HOST, 0).unwrap();
        assert_eq!(addr.host_str(), V2_HOST);
    }

    #[test]
    fn rejects_bad_suffix() {
        assert_eq!(TorAddr::make(".onion", 0), Err(TorAddrError::InvalidAddress));
    }

    #[test]
    fn rejects_port_out_of_range() {
        assert_eq!(
            TorAddr::make(&format!("{V3_HOST}:65536"), 0),
            Err(TorAddrError::InvalidPort)
        );
    }

    #[test]
    fn rejects_non_base32_chars() {
        let bad = format!("A{}", &V3_HOST[1..]);
        assert!(TorAddr::make(&bad, 0).is_err());
    }

    #[test]
    fn str_uses_sentinel_for_unknown() {
        assert!(TorAddr::default().is_unknown());
        assert_eq!(TorAddr::default().str(), UNKNOWN_TOR_HOST);
        assert!(!TorAddr::default().is_blockable());
        assert_eq!(TorAddr::default().host_str(), UNKNOWN_TOR_HOST);
    }

    #[test]
    fn is_same_host_ignores_port() {
        let a = TorAddr::make(V3_HOST, 1).unwrap();
        let b = TorAddr::make(V3_HOST, 2).unwrap();
        assert!(a.is_same_host(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn ordering_is_total() {
        let a = TorAddr::make(V2_HOST, 0).unwrap();
        let b = TorAddr::make(V3_HOST, 0).unwrap();
        let c = TorAddr::unknown();
        for (x, y) in [(&a, &b), (&a, &c), (&b, &c)] {
            let lt = x < y;
            let gt = y < x;
            let eq = x == y;
            assert_eq!([lt, eq, gt].iter().filter(|v| **v).count(), 1);
        }
        assert!(c < a);
        assert!(c < b);
    }

    #[test]
    fn binary_round_trip() {
        let addr = TorAddr::make(&format!("{V3_HOST}:1234"), 0).unwrap();
        let mut buf = Vec::new();
        addr.strict_encode(&mut buf).unwrap();
        let decoded = TorAddr::strict_decode(&buf[..]).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn binary_round_trip_unknown() {
        let addr = TorAddr::unknown();
        let mut buf = Vec::new();
        addr.strict_encode(&mut buf).unwrap();
        let decoded = TorAddr::strict_decode(&buf[..]).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn binary_decode_sanitizes_oversize_host() {
        let addr = TorAddr::make(V3_HOST, 42).unwrap();
        let mut buf = Vec::new();
        addr.strict_encode(&mut buf).unwrap();
        // Extend the declared host length and append one extra byte.
        buf[1] += 1;
        buf.insert(3 + V3_HOST.len(), b'!');
        let decoded = TorAddr::strict_decode(&buf[..]).unwrap();
        assert!(decoded.is_unknown());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn keyed_round_trip() {
        let addr = TorAddr::make(&format!("{V3_HOST}:53"), 0).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.contains("\"tor\""));
        let decoded: TorAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, decoded);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn keyed_sanitizes_oversize_host() {
        let oversize = format!("{}x", V3_HOST);
        let json = format!("{{\"tor\":{{\"host\":\"{oversize}\",\"port\":80}}}}");
        let decoded: TorAddr = serde_json::from_str(&json).unwrap();
        assert!(decoded.is_unknown());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn keyed_sanitizes_out_of_range_port() {
        let json = format!("{{\"tor\":{{\"host\":\"{V3_HOST}\",\"port\":70000}}}}");
        let decoded: TorAddr = serde_json::from_str(&json).unwrap();
        assert!(decoded.is_unknown());
    }
}
