use std::fmt;
use std::str::FromStr;

use ring::digest;

use crate::cid::{decode_base58, validate_multihash, write_varint};
use crate::{Cid, ParseError, CODEC_LIBP2P_KEY};

/// Keys up to this size are inlined with the identity multihash.
const MAX_INLINE_KEY_LENGTH: usize = 42;
const MULTIHASH_IDENTITY: u64 = 0x00;
const MULTIHASH_SHA2_256: u64 = 0x12;

/// A publishable name, derived from a public key.
///
/// The textual form is a CIDv1 with the `libp2p-key` codec, so an identity
/// written into a path is also a valid content address. Parsing also accepts
/// legacy base58btc peer IDs (`Qm...`, `12D3KooW...`).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    multihash: Vec<u8>,
}

impl Identity {
    pub fn from_public_key(key: &[u8]) -> Self {
        let mut multihash = Vec::with_capacity(key.len().min(MAX_INLINE_KEY_LENGTH) + 2);
        if key.len() <= MAX_INLINE_KEY_LENGTH {
            write_varint(&mut multihash, MULTIHASH_IDENTITY);
            write_varint(&mut multihash, key.len() as u64);
            multihash.extend_from_slice(key);
        } else {
            let hash = digest::digest(&digest::SHA256, key);
            write_varint(&mut multihash, MULTIHASH_SHA2_256);
            write_varint(&mut multihash, hash.as_ref().len() as u64);
            multihash.extend_from_slice(hash.as_ref());
        }
        Identity { multihash }
    }

    pub fn from_multihash(multihash: Vec<u8>) -> Result<Self, ParseError> {
        validate_multihash(&multihash)
            .map_err(|reason| ParseError::Identity(format!("{multihash:02x?}"), reason))?;
        Ok(Identity { multihash })
    }

    pub fn multihash(&self) -> &[u8] {
        &self.multihash
    }

    pub fn is_valid(s: &str) -> bool {
        s.parse::<Identity>().is_ok()
    }

    /// The key every store and router addresses this identity's records by.
    pub fn routing_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.multihash.len() + 6);
        key.extend_from_slice(b"/ipns/");
        key.extend_from_slice(&self.multihash);
        key
    }

    pub fn to_cid(&self) -> Cid {
        Cid::new_v1(CODEC_LIBP2P_KEY, self.multihash.clone())
    }
}

impl TryFrom<&Cid> for Identity {
    type Error = ParseError;

    fn try_from(cid: &Cid) -> Result<Self, Self::Error> {
        if cid.codec() != CODEC_LIBP2P_KEY {
            return Err(ParseError::Identity(cid.to_string(), "not a libp2p-key cid"));
        }
        Ok(Identity {
            multihash: cid.multihash().to_vec(),
        })
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("Qm") || s.starts_with('1') {
            let multihash =
                decode_base58(s).ok_or_else(|| ParseError::Identity(s.to_string(), "bad base58"))?;
            return Identity::from_multihash(multihash)
                .map_err(|_| ParseError::Identity(s.to_string(), "not a multihash"));
        }
        let cid: Cid = s
            .parse()
            .map_err(|_| ParseError::Identity(s.to_string(), "not a cid"))?;
        Identity::try_from(&cid)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_cid(), f)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}
