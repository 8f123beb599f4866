use crate::sync::error::ServiceError;
use crate::sync::types::{Record, RecordId, RecordKind};

/// Correlates a request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Successful result of a data-service request.
#[derive(Debug, Clone)]
pub enum ServiceReply {
    /// Every record, grouped by kind, in no particular order.
    Fetched(Vec<(RecordKind, Vec<Record>)>),
    /// The record as stored.
    Written(Record),
    Deleted { kind: RecordKind, id: RecordId },
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub request: RequestId,
    pub outcome: Result<ServiceReply, ServiceError>,
}

/// Minimal interface to the backing document store used by the orchestrator.
///
/// Requests return immediately; their results are picked up with
/// [`DataService::poll_completion`] on the thread that owns the lists, so
/// implementations that finish work elsewhere must queue completions for
/// that thread instead of calling back into it.
pub trait DataService {
    /// Fetches the full record set once.
    fn request_fetch(&mut self) -> RequestId;

    /// Creates or replaces a record.
    fn request_write(&mut self, record: Record) -> RequestId;

    fn request_delete(&mut self, kind: RecordKind, id: RecordId) -> RequestId;

    /// Non-blocking poll: next completion in arrival order, if any.
    fn poll_completion(&mut self) -> Option<Completion>;
}
