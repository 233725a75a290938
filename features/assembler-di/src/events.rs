use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures_channel::mpsc;
use serde_json::Value;

/// Callback registered on an event channel
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Handle to remove a listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Named event channels of a context.
///
/// A channel exists while at least one live instance declares it. Emitting on a
/// channel nobody declared is a no-op, as is listening on one.
#[derive(Default)]
pub(crate) struct EventBus {
    inner: Mutex<EventBusInner>,
}

#[derive(Default)]
struct EventBusInner {
    /// Declared channels and how many live instances declare them
    channels: HashMap<String, usize>,
    listeners: HashMap<String, Vec<Subscription>>,
    next_id: u64,
}

struct Subscription {
    id: ListenerId,
    once: bool,
    sink: Sink,
}

enum Sink {
    Callback(Listener),
    Channel(mpsc::UnboundedSender<Vec<Value>>),
}

impl EventBus {
    fn lock(&self) -> MutexGuard<'_, EventBusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn open(&self, channels: &[String]) {
        if channels.is_empty() {
            return;
        }

        let mut inner = self.lock();
        for channel in channels {
            *inner.channels.entry(channel.clone()).or_default() += 1;
        }
    }

    pub(crate) fn close(&self, channels: &[String]) {
        let mut inner = self.lock();
        for channel in channels {
            let Some(count) = inner.channels.get_mut(channel) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                inner.channels.remove(channel);
                inner.listeners.remove(channel);
                tracing::trace!("Closed event channel {channel}");
            }
        }
    }

    /// How many live instances declare `channel`
    #[cfg(test)]
    pub(crate) fn declared(&self, channel: &str) -> usize {
        self.lock().channels.get(channel).copied().unwrap_or_default()
    }

    pub(crate) fn is_open(&self, channel: &str) -> bool {
        self.lock().channels.contains_key(channel)
    }

    pub(crate) fn listen(&self, channel: &str, listener: Listener, once: bool) -> Option<ListenerId> {
        self.subscribe_sink(channel, Sink::Callback(listener), once)
    }

    pub(crate) fn subscribe(&self, channel: &str) -> Option<mpsc::UnboundedReceiver<Vec<Value>>> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribe_sink(channel, Sink::Channel(sender), false)?;
        Some(receiver)
    }

    fn subscribe_sink(&self, channel: &str, sink: Sink, once: bool) -> Option<ListenerId> {
        let mut inner = self.lock();
        if !inner.channels.contains_key(channel) {
            tracing::trace!("Ignoring listener on undeclared event channel {channel}");
            return None;
        }

        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .listeners
            .entry(channel.to_string())
            .or_default()
            .push(Subscription { id, once, sink });
        Some(id)
    }

    pub(crate) fn remove(&self, channel: &str, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let Some(listeners) = inner.listeners.get_mut(channel) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|subscription| subscription.id != id);
        before != listeners.len()
    }

    /// Delivers `args` to every listener of `channel`, returns how many received it
    pub(crate) fn emit(&self, channel: &str, args: &[Value]) -> usize {
        let (callbacks, delivered) = {
            let mut inner = self.lock();
            if !inner.channels.contains_key(channel) {
                tracing::trace!("Dropping emit on undeclared event channel {channel}");
                return 0;
            }
            let Some(listeners) = inner.listeners.get_mut(channel) else {
                return 0;
            };

            let mut callbacks = Vec::new();
            let mut delivered = 0;
            listeners.retain(|subscription| match &subscription.sink {
                Sink::Callback(callback) => {
                    callbacks.push(callback.clone());
                    !subscription.once
                }
                Sink::Channel(sender) => match sender.unbounded_send(args.to_vec()) {
                    Ok(()) => {
                        delivered += 1;
                        !subscription.once
                    }
                    // Receiver dropped
                    Err(_) => false,
                },
            });
            delivered += callbacks.len();
            (callbacks, delivered)
        };

        // Called without holding the lock, listeners may emit themselves
        for callback in callbacks {
            callback(args);
        }
        delivered
    }

    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.channels.clear();
        inner.listeners.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_map()
            .entries(inner.channels.iter().map(|(channel, _)| {
                let listeners = inner.listeners.get(channel).map_or(0, Vec::len);
                (channel, listeners)
            }))
            .finish()
    }
}
