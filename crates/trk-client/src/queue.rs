//! The in-memory send queue and its persisted snapshot.

use std::collections::VecDeque;

use trk_core::PendingRequest;
use trk_store::QueueStore;

/// FIFO of pending requests, written through to a [`QueueStore`].
///
/// Every mutation persists the full snapshot. A failed write is logged and
/// the in-memory queue stays authoritative; the next successful write
/// reconciles the store.
#[derive(Debug, Default)]
pub(crate) struct SendQueue {
    requests: VecDeque<PendingRequest>,
}

impl SendQueue {
    /// Restores the queue from `store`, migrating legacy dispatch markers.
    ///
    /// An unreadable store yields an empty queue.
    pub(crate) fn restore<S: QueueStore + ?Sized>(store: &mut S) -> Self {
        let urls = store.load_queue().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load pending requests; starting empty");
            Vec::new()
        });
        let requests: VecDeque<_> = urls.into_iter().map(PendingRequest::from_persisted).collect();
        tracing::debug!(pending = requests.len(), "restored send queue");
        Self { requests }
    }

    pub(crate) fn push<S: QueueStore + ?Sized>(&mut self, request: PendingRequest, store: &mut S) {
        self.requests.push_back(request);
        tracing::debug!(pending = self.requests.len(), "request enqueued");
        self.persist(store);
    }

    pub(crate) fn head(&self) -> Option<&PendingRequest> {
        self.requests.front()
    }

    /// Removes the head if it is `delivered`. Returns whether it was removed.
    pub(crate) fn complete_head<S: QueueStore + ?Sized>(
        &mut self,
        delivered: &PendingRequest,
        store: &mut S,
    ) -> bool {
        if self.requests.front() != Some(delivered) {
            tracing::warn!("delivered request is no longer at the head of the queue");
            return false;
        }
        self.requests.pop_front();
        tracing::debug!(pending = self.requests.len(), "request delivered");
        self.persist(store);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<PendingRequest> {
        self.requests.iter().cloned().collect()
    }

    fn persist<S: QueueStore + ?Sized>(&self, store: &mut S) {
        let urls: Vec<String> = self
            .requests
            .iter()
            .map(|request| request.as_str().to_string())
            .collect();
        if let Err(err) = store.save_queue(&urls) {
            tracing::warn!(error = %err, pending = urls.len(), "failed to persist send queue");
        }
    }
}

#[cfg(test)]
mod tests {
    use trk_store::MemoryStore;

    use super::*;

    fn request(url: &str) -> PendingRequest {
        PendingRequest::from_persisted(url)
    }

    #[test]
    fn restore_normalizes_and_keeps_order() {
        let mut store = MemoryStore::with_raw_queue(vec![
            Some("https://h/e?_k=k&_p=p&_d=0&_t=1&_n=a".to_string()),
            None,
            Some("https://h/s?_k=k&_p=p&_d=1&_t=2&x=1".to_string()),
        ]);
        let queue = SendQueue::restore(&mut store);
        let urls: Vec<_> = queue
            .snapshot()
            .into_iter()
            .map(PendingRequest::into_string)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://h/e?_k=k&_p=p&_d=1&_t=1&_n=a",
                "https://h/s?_k=k&_p=p&_d=1&_t=2&x=1",
            ]
        );
    }

    #[test]
    fn push_persists_every_mutation() {
        let mut store = MemoryStore::new();
        let mut queue = SendQueue::default();
        queue.push(request("a"), &mut store);
        queue.push(request("b"), &mut store);
        assert_eq!(store.queue(), vec!["a", "b"]);
        assert_eq!(store.queue_saves(), 2);
    }

    #[test]
    fn complete_head_only_removes_matching_request() {
        let mut store = MemoryStore::new();
        let mut queue = SendQueue::default();
        queue.push(request("a"), &mut store);
        queue.push(request("b"), &mut store);

        assert!(!queue.complete_head(&request("b"), &mut store));
        assert_eq!(queue.len(), 2);

        assert!(queue.complete_head(&request("a"), &mut store));
        assert_eq!(queue.head(), Some(&request("b")));
        assert_eq!(store.queue(), vec!["b"]);
    }

    #[test]
    fn failed_persist_keeps_memory_queue() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        let mut queue = SendQueue::default();
        queue.push(request("a"), &mut store);

        assert_eq!(queue.len(), 1);
        assert!(store.queue().is_empty());

        store.set_fail_writes(false);
        queue.push(request("b"), &mut store);
        assert_eq!(store.queue(), vec!["a", "b"]);
    }
}
