use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::{Rc, Weak},
};

type Callback<T> = Rc<dyn Fn(&T)>;

struct Registration<T> {
    id: u64,
    callback: Callback<T>,
}

struct Registry<T> {
    channels: HashMap<String, Vec<Registration<T>>>,
}

impl<T> Registry<T> {
    fn remove(&mut self, channel: &str, id: u64) {
        if let Some(subscribers) = self.channels.get_mut(channel) {
            subscribers.retain(|registration| registration.id != id);
        }
    }
}

/// Named-channel publish/subscribe.
///
/// Single-threaded. Callbacks run synchronously on the publishing thread and
/// may subscribe, unsubscribe or publish again while being notified.
pub struct EventBus<T> {
    registry: Rc<RefCell<Registry<T>>>,
    next_id: Cell<u64>,
}

impl<T: 'static> EventBus<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                channels: HashMap::new(),
            })),
            next_id: Cell::new(0),
        }
    }

    /// Registers `callback` on `channel`, creating the channel on first use.
    pub fn subscribe(&self, channel: &str, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        self.registry
            .borrow_mut()
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(Registration {
                id,
                callback: Rc::new(callback),
            });

        let registry: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        let channel = channel.to_string();
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().remove(&channel, id);
            }
        })
    }

    /// Invokes every callback registered on `channel` at the time of the call.
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    pub fn publish(&self, channel: &str, payload: &T) {
        let callbacks: Vec<Callback<T>> = match self.registry.borrow().channels.get(channel) {
            Some(subscribers) => subscribers
                .iter()
                .map(|registration| registration.callback.clone())
                .collect(),
            None => return,
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| (*callback)(payload))).is_err() {
                tracing::error!(channel, "subscriber panicked; continuing with the rest");
            }
        }
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry
            .borrow()
            .channels
            .get(channel)
            .map_or(0, Vec::len)
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.registry.borrow().channels.contains_key(channel)
    }

    /// Drops every registration on every channel.
    pub fn clear(&self) {
        self.registry.borrow_mut().channels.clear();
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut channels: Vec<(&String, usize)> = registry
            .channels
            .iter()
            .map(|(name, subscribers)| (name, subscribers.len()))
            .collect();
        channels.sort();
        f.debug_struct("EventBus").field("channels", &channels).finish()
    }
}

/// Capability that removes exactly one registration.
///
/// Dropping it without calling [`Subscription::unsubscribe`] leaves the
/// callback registered.
#[must_use = "dropping a Subscription keeps the callback registered forever"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
