//! Call-state delivery from the platform to the scheduler.
//!
//! The host registers the scheduler with a [`TelephonyObserver`] at process
//! start and deregisters it at shutdown. The observer only holds the handle
//! it was given; there is no back-reference from the scheduler.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::scheduler::{BeepScheduler, CallState};
use crate::storage::Storage;

/// Receives call interruptions.
pub trait CallInterruptHandler: Send + Sync {
    fn on_call_interrupt(&self, in_call: bool) -> Result<Vec<Event>>;
}

impl<S: Storage> CallInterruptHandler for BeepScheduler<S> {
    fn on_call_interrupt(&self, in_call: bool) -> Result<Vec<Event>> {
        BeepScheduler::on_call_interrupt(self, in_call)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

/// Source of call-state changes.
pub trait TelephonyObserver: Send + Sync {
    fn register(&self, handler: Arc<dyn CallInterruptHandler>) -> ListenerHandle;
    fn deregister(&self, handle: ListenerHandle);
}

#[derive(Default)]
struct HubInner {
    next_handle: u64,
    listeners: BTreeMap<ListenerHandle, Arc<dyn CallInterruptHandler>>,
}

/// In-process observer: the host feeds raw [`CallState`]s in, registered
/// handlers get `on_call_interrupt` calls out.
#[derive(Default)]
pub struct TelephonyHub {
    inner: Mutex<HubInner>,
}

impl TelephonyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a platform call state to every registered handler.
    ///
    /// Handler failures are logged and returned; delivery to the other
    /// handlers still happens.
    pub fn publish(&self, state: CallState) -> Result<Vec<Event>> {
        // Snapshot so handlers run without the hub lock.
        let listeners: Vec<_> = self
            .inner
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?
            .listeners
            .values()
            .cloned()
            .collect();

        let in_call = state.is_in_call();
        debug!(?state, listeners = listeners.len(), "publishing call state");

        let mut events = Vec::new();
        let mut first_error = None;
        for listener in listeners {
            match listener.on_call_interrupt(in_call) {
                Ok(mut produced) => events.append(&mut produced),
                Err(err) => {
                    error!(error = %err, "call interrupt handler failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(events),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.listeners.len()).unwrap_or(0)
    }
}

impl TelephonyObserver for TelephonyHub {
    fn register(&self, handler: Arc<dyn CallInterruptHandler>) -> ListenerHandle {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.next_handle += 1;
        let handle = ListenerHandle(inner.next_handle);
        inner.listeners.insert(handle, handler);
        handle
    }

    fn deregister(&self, handle: ListenerHandle) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.listeners.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<bool>>,
    }

    impl CallInterruptHandler for Recorder {
        fn on_call_interrupt(&self, in_call: bool) -> Result<Vec<Event>> {
            self.calls.lock().unwrap().push(in_call);
            Ok(Vec::new())
        }
    }

    #[test]
    fn publish_maps_states_to_in_call() {
        let hub = TelephonyHub::new();
        let recorder = Arc::new(Recorder::default());
        hub.register(recorder.clone());

        hub.publish(CallState::Ringing).unwrap();
        hub.publish(CallState::OffHook).unwrap();
        hub.publish(CallState::Idle).unwrap();

        assert_eq!(*recorder.calls.lock().unwrap(), vec![true, true, false]);
    }

    #[test]
    fn deregistered_handlers_stop_receiving() {
        let hub = TelephonyHub::new();
        let recorder = Arc::new(Recorder::default());
        let handle = hub.register(recorder.clone());
        assert_eq!(hub.listener_count(), 1);

        hub.deregister(handle);
        assert_eq!(hub.listener_count(), 0);
        hub.publish(CallState::Ringing).unwrap();
        assert!(recorder.calls.lock().unwrap().is_empty());
    }
}
