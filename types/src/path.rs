use std::fmt;
use std::str::FromStr;

use crate::{Cid, Identity, ParseError};

/// Target of a name record: either immutable content or another name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    Ipfs(Cid),
    Ipns(Identity),
}

impl From<Cid> for Path {
    fn from(cid: Cid) -> Self {
        Path::Ipfs(cid)
    }
}

impl From<Identity> for Path {
    fn from(identity: Identity) -> Self {
        Path::Ipns(identity)
    }
}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            ["", "ipfs", cid] => Ok(Path::Ipfs(
                cid.parse().map_err(|_| ParseError::Path(s.to_string()))?,
            )),
            ["", "ipns", identity] => Ok(Path::Ipns(
                identity.parse().map_err(|_| ParseError::Path(s.to_string()))?,
            )),
            _ => Err(ParseError::Path(s.to_string())),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Ipfs(cid) => write!(f, "/ipfs/{cid}"),
            Path::Ipns(identity) => write!(f, "/ipns/{identity}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        let path: Path = "/ipfs/QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn"
            .parse()
            .unwrap();
        assert!(matches!(path, Path::Ipfs(_)));
        assert_eq!(
            path.to_string(),
            "/ipfs/QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn"
        );

        let identity = Identity::from_public_key(b"some public key");
        let path: Path = format!("/ipns/{identity}").parse().unwrap();
        assert_eq!(path, Path::Ipns(identity));
    }

    #[test]
    fn test_parse_ipns_peer_id_forms() {
        let mut key = vec![0x08, 0x01, 0x12, 0x20];
        key.extend(1..=32u8);
        let expected = Path::Ipns(Identity::from_public_key(&key));
        for s in [
            "/ipns/12D3KooW9tJMax94Lrqw7Y5Qw36viGQAS2gTEPQ5Wg1vTk7xPfQs",
            "/ipns/k51qzi5uqu5dg7hrs1jyr49oygapxsw71v7pv43rk8lemejo9h2m3hkzvww8io",
            "/ipns/bafzaajaiaejcaaicamcakbqhbaequcymbuha6earcijrifiwc4mbsgq3dqor4hza",
        ] {
            assert_eq!(s.parse::<Path>().unwrap(), expected, "{s}");
        }
        let legacy: Path = "/ipns/QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn"
            .parse()
            .unwrap();
        assert!(matches!(legacy, Path::Ipns(_)));
    }

    #[test]
    fn test_reject_malformed_paths() {
        for s in [
            "",
            "/ipfs",
            "ipfs/QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn",
            "/ipfs/QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn/readme",
            "/ipns/example.com",
            "/foo/QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn",
        ] {
            assert!(s.parse::<Path>().is_err(), "{s} should not parse");
        }
    }
}
