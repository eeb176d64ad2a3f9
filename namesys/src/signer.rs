use std::time::Duration;

use types::Identity;

use crate::{Error, NameRecord};

/// Creates, encodes and checks name records.
///
/// Key material and the record wire format live behind this trait.
pub trait RecordSigner: Send + Sync {
    fn create(
        &self,
        identity: &Identity,
        value: &[u8],
        sequence: u64,
        lifetime: Duration,
    ) -> Result<NameRecord, Error>;

    fn marshal(&self, record: &NameRecord) -> Result<Vec<u8>, Error>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<NameRecord, Error>;

    /// Checks that `bytes` is a valid, unexpired record for `routing_key`.
    fn validate(&self, routing_key: &[u8], bytes: &[u8]) -> Result<(), Error>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
    use chrono::{TimeZone, Utc};
    use std::io::{Cursor, Read};

    /// Signs a record by embedding the routing key of its identity.
    pub struct TestSigner;

    impl RecordSigner for TestSigner {
        fn create(
            &self,
            identity: &Identity,
            value: &[u8],
            sequence: u64,
            lifetime: Duration,
        ) -> Result<NameRecord, Error> {
            let lifetime = chrono::Duration::from_std(lifetime)
                .map_err(|e| Error::Validation(e.to_string()))?;
            Ok(NameRecord {
                value: value.to_vec(),
                sequence,
                validity: Utc::now() + lifetime,
                signature: identity.routing_key(),
            })
        }

        fn marshal(&self, record: &NameRecord) -> Result<Vec<u8>, Error> {
            let mut buf = Vec::new();
            let _ = buf.write_u64::<BigEndian>(record.sequence);
            let _ = buf.write_i64::<BigEndian>(record.validity.timestamp_millis());
            let _ = buf.write_u32::<BigEndian>(record.value.len() as u32);
            buf.extend_from_slice(&record.value);
            buf.extend_from_slice(&record.signature);
            Ok(buf)
        }

        fn unmarshal(&self, bytes: &[u8]) -> Result<NameRecord, Error> {
            let malformed = |_| Error::Validation("truncated record".to_string());
            let mut cur = Cursor::new(bytes);
            let sequence = cur.read_u64::<BigEndian>().map_err(malformed)?;
            let millis = cur.read_i64::<BigEndian>().map_err(malformed)?;
            let len = cur.read_u32::<BigEndian>().map_err(malformed)?;
            let mut value = vec![0; len as usize];
            cur.read_exact(&mut value).map_err(malformed)?;
            let mut signature = Vec::new();
            let _ = cur.read_to_end(&mut signature);
            let validity = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| Error::Validation("bad validity".to_string()))?;
            Ok(NameRecord {
                value,
                sequence,
                validity,
                signature,
            })
        }

        fn validate(&self, routing_key: &[u8], bytes: &[u8]) -> Result<(), Error> {
            let record = self.unmarshal(bytes)?;
            if record.signature != routing_key {
                return Err(Error::Validation("signature mismatch".to_string()));
            }
            if record.is_expired_at(Utc::now()) {
                return Err(Error::Validation("record expired".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_signer_validates_owner_and_expiry() {
        let alice = Identity::from_public_key(b"alice");
        let bob = Identity::from_public_key(b"bob");
        let record = TestSigner
            .create(&alice, b"/ipfs/x", 3, Duration::from_secs(60))
            .unwrap();
        let bytes = TestSigner.marshal(&record).unwrap();
        assert_eq!(TestSigner.unmarshal(&bytes).unwrap(), NameRecord {
            validity: Utc
                .timestamp_millis_opt(record.validity.timestamp_millis())
                .unwrap(),
            ..record.clone()
        });
        assert!(TestSigner.validate(&alice.routing_key(), &bytes).is_ok());
        assert!(matches!(
            TestSigner.validate(&bob.routing_key(), &bytes),
            Err(Error::Validation(_))
        ));

        let expired = TestSigner
            .create(&alice, b"/ipfs/x", 4, Duration::ZERO)
            .unwrap();
        let bytes = TestSigner.marshal(&expired).unwrap();
        assert!(TestSigner.validate(&alice.routing_key(), &bytes).is_err());
    }
}
