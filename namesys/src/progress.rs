use std::sync::Arc;

use dnslink::DnsLinkEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSysEvent {
    /// The record was written to the local store.
    PublishLocal { routing_key: Vec<u8> },
    /// A router accepted the record.
    PublishRouter { router: String },
    /// A router is being asked for the record.
    ResolveQuery { router: String },
    /// A router answered with a record that validated.
    ResolveAnswer { router: String },
    DnsLink(DnsLinkEvent),
}

pub type ProgressSink = Arc<dyn Fn(NameSysEvent) + Send + Sync>;

pub(crate) fn emit(sink: &Option<ProgressSink>, event: NameSysEvent) {
    if let Some(sink) = sink {
        sink(event);
    }
}
