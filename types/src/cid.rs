//! Content addresses as found in dnslink values and record targets: CIDv0
//! (base58btc `Qm...`) and CIDv1 in base32-lower (`b`), base58btc (`z`) or
//! base36-lower (`k`) multibase.

use std::fmt;
use std::str::FromStr;

use crate::{base32_lower, decode_base32_lower, ParseError};

pub const CODEC_RAW: u64 = 0x55;
pub const CODEC_DAG_PB: u64 = 0x70;
pub const CODEC_LIBP2P_KEY: u64 = 0x72;

const MULTIHASH_SHA2_256: u64 = 0x12;
const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cid {
    version: u64,
    codec: u64,
    multihash: Vec<u8>,
    text: String,
}

impl Cid {
    pub fn new_v1(codec: u64, multihash: Vec<u8>) -> Self {
        let mut bytes = Vec::with_capacity(multihash.len() + 4);
        write_varint(&mut bytes, 1);
        write_varint(&mut bytes, codec);
        bytes.extend_from_slice(&multihash);
        Cid {
            version: 1,
            codec,
            multihash,
            text: format!("b{}", base32_lower(&bytes)),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn codec(&self) -> u64 {
        self.codec
    }

    pub fn multihash(&self) -> &[u8] {
        &self.multihash
    }

    /// Cheap syntactic check used to decide whether a dnslink segment is terminal.
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Cid>().is_ok()
    }

    fn parse_v0(s: &str) -> Result<Self, ParseError> {
        let bytes = decode_base58(s).ok_or_else(|| ParseError::Cid(s.to_string(), "bad base58"))?;
        if bytes.len() != 34 || bytes[0] != MULTIHASH_SHA2_256 as u8 || bytes[1] != 32 {
            return Err(ParseError::Cid(s.to_string(), "not a sha2-256 multihash"));
        }
        Ok(Cid {
            version: 0,
            codec: CODEC_DAG_PB,
            multihash: bytes,
            text: s.to_string(),
        })
    }

    fn parse_v1(s: &str) -> Result<Self, ParseError> {
        let body = &s[1..];
        let bytes = match s.as_bytes()[0] {
            b'b' => decode_base32_lower(body),
            b'z' => decode_base58(body),
            b'k' => decode_base36(body),
            _ => None,
        }
        .ok_or_else(|| ParseError::Cid(s.to_string(), "bad multibase"))?;
        let mut rest = &bytes[..];
        let version = read_varint(&mut rest).ok_or_else(|| ParseError::Cid(s.to_string(), "truncated"))?;
        if version != 1 {
            return Err(ParseError::Cid(s.to_string(), "unsupported version"));
        }
        let codec = read_varint(&mut rest).ok_or_else(|| ParseError::Cid(s.to_string(), "truncated"))?;
        validate_multihash(rest).map_err(|reason| ParseError::Cid(s.to_string(), reason))?;
        Ok(Cid {
            version,
            codec,
            multihash: rest.to_vec(),
            text: s.to_string(),
        })
    }
}

impl FromStr for Cid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 46 && s.starts_with("Qm") {
            Cid::parse_v0(s)
        } else if s.len() > 1 && matches!(s.as_bytes()[0], b'b' | b'z' | b'k') {
            Cid::parse_v1(s)
        } else {
            Err(ParseError::Cid(s.to_string(), "unsupported encoding"))
        }
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.text)
    }
}

pub(crate) fn validate_multihash(mut mh: &[u8]) -> Result<(), &'static str> {
    let _code = read_varint(&mut mh).ok_or("truncated multihash")?;
    let len = read_varint(&mut mh).ok_or("truncated multihash")?;
    if mh.len() as u64 != len {
        return Err("multihash length mismatch");
    }
    Ok(())
}

pub(crate) fn read_varint(buf: &mut &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    for (i, byte) in buf.iter().enumerate().take(9) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *buf = &buf[i + 1..];
            return Some(value);
        }
    }
    None
}

pub(crate) fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

pub(crate) fn decode_base58(s: &str) -> Option<Vec<u8>> {
    decode_base_x(BASE58_ALPHABET, s)
}

fn decode_base36(s: &str) -> Option<Vec<u8>> {
    decode_base_x(BASE36_ALPHABET, s)
}

/// Big-endian positional decoding; each leading zero digit is a zero byte.
fn decode_base_x(alphabet: &[u8], s: &str) -> Option<Vec<u8>> {
    if s.is_empty() {
        return None;
    }
    let base = alphabet.len() as u32;
    let mut bytes: Vec<u8> = Vec::with_capacity(s.len());
    for c in s.bytes() {
        let mut carry = alphabet.iter().position(|&a| a == c)? as u32;
        for b in bytes.iter_mut().rev() {
            carry += u32::from(*b) * base;
            *b = carry as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.insert(0, carry as u8);
            carry >>= 8;
        }
    }
    let zeros = s.bytes().take_while(|&c| c == alphabet[0]).count();
    let mut out = vec![0u8; zeros];
    out.extend(bytes);
    Some(out)
}
