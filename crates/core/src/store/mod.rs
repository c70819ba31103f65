use std::{cell::RefCell, collections::HashMap, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    events::{EventBus, Subscription},
    protocol::Action,
    transport::Transport,
};

const CHANGES: &str = "parameters";

/// Where a stored value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOrigin {
    /// Optimistic write made by the surface itself.
    Local,
    /// Authoritative echo from the host.
    Host,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub id: String,
    pub value: f64,
    pub origin: ChangeOrigin,
}

/// Last-known value of every parameter seen so far.
///
/// Echoes carry no sequence number, so a slow host can overwrite a newer
/// local write with the echo of an older one. Whatever arrived last wins.
#[derive(Debug)]
pub struct ParameterStore {
    values: RefCell<HashMap<String, f64>>,
    changes: EventBus<ParameterChange>,
    transport: Rc<Transport>,
}

impl ParameterStore {
    pub fn new(transport: Rc<Transport>) -> Self {
        Self {
            values: RefCell::new(HashMap::new()),
            changes: EventBus::new(),
            transport,
        }
    }

    pub fn read(&self, id: &str) -> Option<f64> {
        self.values.borrow().get(id).copied()
    }

    /// Stores `value` immediately, notifies observers, then forwards it to
    /// the host.
    pub fn write(&self, id: &str, value: f64) {
        self.store(ParameterChange {
            id: id.to_string(),
            value,
            origin: ChangeOrigin::Local,
        });
        self.transport.invoke(Action::SendParameterValue {
            id: id.to_string(),
            value,
        });
    }

    /// Overwrites the stored value with the host's and notifies observers.
    pub fn apply_echo(&self, id: &str, value: f64) {
        self.store(ParameterChange {
            id: id.to_string(),
            value,
            origin: ChangeOrigin::Host,
        });
    }

    fn store(&self, change: ParameterChange) {
        self.values
            .borrow_mut()
            .insert(change.id.clone(), change.value);
        self.changes.publish(CHANGES, &change);
    }

    pub fn subscribe(&self, callback: impl Fn(&ParameterChange) + 'static) -> Subscription {
        self.changes.subscribe(CHANGES, callback)
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.values.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Drops all observers. Stored values are kept.
    pub fn clear_subscribers(&self) {
        self.changes.clear();
    }
}
