//! Pub/Sub event bus between the viewer core and its front-end.
//!
//! Architecture:
//! - Subscribers register per event type and are invoked synchronously on emit
//! - Every emitted event is also queued; `poll()` drains the queue so a
//!   front-end loop (CLI, UI) can process events in batches
//!
//! Callback order is FIFO per event type. Emit may be called from the playback
//! thread (frame events) as well as from the owner thread.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

pub type BoxedEvent = Box<dyn Event>;

type Subscribers = Arc<RwLock<HashMap<TypeId, Vec<Callback>>>>;
type Queue = Arc<Mutex<Vec<BoxedEvent>>>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Subscribers,
    queue: Queue,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E (called on the emitting thread)
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    pub fn emit<E: Event>(&self, event: E) {
        dispatch(&self.subscribers, &self.queue, event);
    }

    /// Drain all queued events
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Cloneable emit-only handle (for closures running on other threads)
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            subscribers: Arc::clone(&self.subscribers),
            queue: Arc::clone(&self.queue),
        }
    }

    pub fn unsubscribe_all<E: Event>(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Clone)]
pub struct EventEmitter {
    subscribers: Subscribers,
    queue: Queue,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscriber_types", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit<E: Event>(&self, event: E) {
        dispatch(&self.subscribers, &self.queue, event);
    }
}

fn dispatch<E: Event>(subscribers: &Subscribers, queue: &Queue, event: E) {
    if let Some(cbs) = subscribers
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&TypeId::of::<E>())
    {
        for cb in cbs {
            cb(&event);
        }
    }

    let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
    if queue.len() >= MAX_QUEUE_SIZE {
        let evict_count = queue.len() / 2;
        warn!("Event queue full ({} events), evicting oldest {}", queue.len(), evict_count);
        queue.drain(0..evict_count);
    }
    queue.push(Box::new(event));
}

/// Downcast a polled event.
///
/// Derefs to `dyn Event` first: calling `as_any()` on the `Box` itself would
/// hit the blanket impl for `Box<dyn Event>` and never match.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}
