//! Fetch controllers.
//!
//! Each query type decides *when* to hit the network and imports what comes
//! back through the reducer. Failures are absorbed into state: callers
//! observe `is_error`/`error` rather than receiving an `Err`.
//!
//! - [`ListQuery`]: paginated list with staleness and single-flight policy
//! - [`EntityQuery`]: one entity by id
//! - [`LookupQuery`]: one entity by predicate
//! - [`BatchQuery`]: many entities by id, fetching only the missing ones

mod batch;
mod entity;
mod list;
mod lookup;

use std::sync::Arc;

use tokio::sync::watch;

use crate::EntityError;

pub use batch::BatchQuery;
pub use entity::EntityQuery;
pub use list::ListQuery;
pub use lookup::LookupQuery;

/// Request state for queries that are not backed by a list.
#[derive(Debug, Clone, Default)]
pub struct RequestStatus {
    pub fetching: bool,
    /// Last failure. Cleared by the next successful fetch.
    pub error: Option<Arc<EntityError>>,
}

/// Single-flight request bookkeeping shared by the non-list queries.
pub(crate) struct RequestTracker {
    status: watch::Sender<RequestStatus>,
}

impl RequestTracker {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(RequestStatus::default());
        Self { status }
    }

    /// Claim the request slot. Returns `false` if a request is in flight.
    pub(crate) fn begin(&self) -> bool {
        self.status.send_if_modified(|s| {
            if s.fetching {
                return false;
            }
            s.fetching = true;
            true
        })
    }

    pub(crate) fn finish(&self, result: Result<(), EntityError>) {
        self.status.send_modify(|s| {
            s.fetching = false;
            s.error = result.err().map(Arc::new);
        });
    }

    pub(crate) fn status(&self) -> RequestStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RequestStatus> {
        self.status.subscribe()
    }

    pub(crate) fn is_fetching(&self) -> bool {
        self.status.borrow().fetching
    }

    pub(crate) fn error(&self) -> Option<Arc<EntityError>> {
        self.status.borrow().error.clone()
    }

    pub(crate) fn error_status(&self) -> Option<u16> {
        self.status.borrow().error.as_ref().and_then(|e| e.status())
    }
}
