use crate::Error;

/// One TXT answer as reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub name: String,
    /// Seconds; `None` when the transport did not report one.
    pub ttl: Option<u32>,
    pub data: String,
}

const DNSLINK_PREFIX: &str = "dnslink=";

fn is_dnslink(data: &str) -> bool {
    data.contains("dnslink=/ipfs") || data.contains("dnslink=/ipns")
}

/// Picks the last answer carrying a `dnslink=/ipfs` or `dnslink=/ipns` value.
pub fn find_dnslink_answer<'a>(domain: &str, answers: &'a [DnsAnswer]) -> Result<&'a DnsAnswer, Error> {
    answers
        .iter()
        .rev()
        .find(|answer| is_dnslink(&answer.data))
        .ok_or_else(|| Error::DnsLinkNotFound {
            domain: domain.to_string(),
        })
}

/// Strips surrounding quotes and the `dnslink=` prefix from TXT data.
pub fn dnslink_value(data: &str) -> String {
    let data = data.strip_prefix('"').unwrap_or(data);
    let data = data.strip_suffix('"').unwrap_or(data);
    data.replacen(DNSLINK_PREFIX, "", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(data: &str) -> DnsAnswer {
        DnsAnswer {
            name: "example.com".to_string(),
            ttl: Some(300),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_find_last_dnslink_answer() {
        let answers = vec![
            answer("\"v=spf1 -all\""),
            answer("\"dnslink=/ipfs/QmYjtig7VJQ6XsnUjqqJvj7QaMcCAwtrgNdahSiFofrE7o\""),
            answer("\"dnslink=/ipns/example.org\""),
            answer("\"google-site-verification=abc\""),
        ];
        let found = find_dnslink_answer("example.com", &answers).unwrap();
        assert_eq!(found.data, "\"dnslink=/ipns/example.org\"");
    }

    #[test]
    fn test_no_dnslink_answer() {
        let answers = vec![answer("\"v=spf1 -all\""), answer("dnslink=/foo/bar")];
        assert_eq!(
            find_dnslink_answer("example.com", &answers),
            Err(Error::DnsLinkNotFound {
                domain: "example.com".to_string()
            })
        );
        assert!(find_dnslink_answer("example.com", &[]).is_err());
    }

    #[test]
    fn test_dnslink_value() {
        assert_eq!(
            dnslink_value("\"dnslink=/ipfs/QmYjtig7VJQ6XsnUjqqJvj7QaMcCAwtrgNdahSiFofrE7o\""),
            "/ipfs/QmYjtig7VJQ6XsnUjqqJvj7QaMcCAwtrgNdahSiFofrE7o"
        );
        assert_eq!(dnslink_value("dnslink=/ipns/example.org"), "/ipns/example.org");
    }
}
