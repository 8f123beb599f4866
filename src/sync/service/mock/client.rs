use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::sync::error::ServiceError;
use crate::sync::service::api::{Completion, DataService, RequestId, ServiceReply};
use crate::sync::types::{Record, RecordId, RecordKind};

/// Pure in-memory data service for tests.
///
/// Requests complete in submission order unless `hold` is set, in which
/// case completions stay queued until `release` is called.
pub struct MockDataService {
    pub records: BTreeMap<(RecordKind, RecordId), Record>,
    pub fail_fetch: bool,
    pub fail_ids: HashSet<RecordId>,
    pub requests: Vec<RequestId>,
    pub hold: bool,
    held: VecDeque<Completion>,
    ready: VecDeque<Completion>,
    next_id: u64,
}

impl MockDataService {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            fail_fetch: false,
            fail_ids: HashSet::new(),
            requests: Vec::new(),
            hold: false,
            held: VecDeque::new(),
            ready: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut mock = Self::new();
        for r in records {
            mock.records.insert((r.kind, r.id.clone()), r);
        }
        mock
    }

    /// Delivers held completions in the given order of request ids.
    pub fn release(&mut self, order: &[RequestId]) {
        for id in order {
            if let Some(pos) = self.held.iter().position(|c| c.request == *id) {
                if let Some(c) = self.held.remove(pos) {
                    self.ready.push_back(c);
                }
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.held.len() + self.ready.len()
    }

    fn complete(&mut self, outcome: Result<ServiceReply, ServiceError>) -> RequestId {
        let request = RequestId(self.next_id);
        self.next_id += 1;
        self.requests.push(request);

        let completion = Completion { request, outcome };
        if self.hold {
            self.held.push_back(completion);
        } else {
            self.ready.push_back(completion);
        }
        request
    }
}

impl Default for MockDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl DataService for MockDataService {
    fn request_fetch(&mut self) -> RequestId {
        let outcome = if self.fail_fetch {
            Err(ServiceError::Fetch("mock offline".into()))
        } else {
            let grouped = RecordKind::ALL
                .into_iter()
                .map(|kind| {
                    let records = self
                        .records
                        .values()
                        .filter(|r| r.kind == kind)
                        .cloned()
                        .collect();
                    (kind, records)
                })
                .collect();
            Ok(ServiceReply::Fetched(grouped))
        };
        self.complete(outcome)
    }

    fn request_write(&mut self, record: Record) -> RequestId {
        let outcome = if self.fail_ids.contains(&record.id) {
            Err(ServiceError::Write {
                id: record.id.clone(),
                reason: "mock rejected write".into(),
            })
        } else {
            self.records.insert((record.kind, record.id.clone()), record.clone());
            Ok(ServiceReply::Written(record))
        };
        self.complete(outcome)
    }

    fn request_delete(&mut self, kind: RecordKind, id: RecordId) -> RequestId {
        let outcome = if self.fail_ids.contains(&id) {
            Err(ServiceError::Delete {
                id,
                reason: "mock rejected delete".into(),
            })
        } else {
            self.records.remove(&(kind, id.clone()));
            Ok(ServiceReply::Deleted { kind, id })
        };
        self.complete(outcome)
    }

    fn poll_completion(&mut self) -> Option<Completion> {
        self.ready.pop_front()
    }
}
