use std::sync::Arc;

use authstate_core::session::ExpirationReason;

/// Observer notified when a session ends because a deadline elapsed.
///
/// Called synchronously at the point the transition is detected (a read, an
/// activity update or a timer). Explicit `end_session` calls are not reported.
pub trait ExpirationListener: Send + Sync {
    fn on_expiration(&self, reason: ExpirationReason);
}

impl<F> ExpirationListener for F
where
    F: Fn(ExpirationReason) + Send + Sync,
{
    fn on_expiration(&self, reason: ExpirationReason) {
        self(reason)
    }
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<dyn ExpirationListener>)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Arc<dyn ExpirationListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    /// Snapshot so callbacks run without holding the registry lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ExpirationListener>> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }
}
