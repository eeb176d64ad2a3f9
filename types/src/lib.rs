mod cid;
mod identity;
mod path;
mod signal;

pub use cid::{Cid, CODEC_DAG_PB, CODEC_LIBP2P_KEY, CODEC_RAW};
pub use identity::Identity;
pub use path::Path;
pub use signal::{AbortController, AbortSignal, Aborted};

use thiserror::Error;

/// Failure to interpret a content address, identity or path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid cid `{0}`: {1}")]
    Cid(String, &'static str),
    #[error("invalid identity `{0}`: {1}")]
    Identity(String, &'static str),
    #[error("invalid path `{0}`")]
    Path(String),
}

/// Unpadded base64url, as used in DNS-over-HTTPS queries and pubsub topics.
pub const URL_SAFE_ENGINE: base64::engine::fast_portable::FastPortable =
    base64::engine::fast_portable::FastPortable::from(
        &base64::alphabet::URL_SAFE,
        base64::engine::fast_portable::FastPortableConfig::new()
            .with_encode_padding(false)
            .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent),
    );

/// Lower-case RFC 4648 base32 without padding, as used for multibase `b`.
pub fn base32_lower(data: &[u8]) -> String {
    data_encoding::BASE32_NOPAD
        .encode(data)
        .to_ascii_lowercase()
}

pub(crate) fn decode_base32_lower(s: &str) -> Option<Vec<u8>> {
    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    data_encoding::BASE32_NOPAD
        .decode(s.to_ascii_uppercase().as_bytes())
        .ok()
}
