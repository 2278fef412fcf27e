//! Typed publish/subscribe between controllers.
//!
//! Replaces DOM-event broadcasting: the navigator publishes [`InitScope`] after every
//! swap and each feature controller subscribes to rebind its handlers.

use std::cell::RefCell;
use std::rc::Rc;

type Listener<T> = Rc<dyn Fn(&T)>;

/// Which part of the page was (re)initialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitScope {
    /// All tracked regions were replaced (or the page just loaded).
    Page,
    /// A single region identified by its selector was reloaded.
    Region(String),
}

impl InitScope {
    /// Selector to scope DOM queries to, `None` for the whole document.
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Page => None,
            Self::Region(selector) => Some(selector),
        }
    }
}

/// Local lifecycle notifications of the event bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusStatus {
    /// Handshake completed; messages may be sent.
    Open,
    /// Connection dropped (intentionally or not).
    Closed,
}

/// Ordered single-threaded listener list.
pub struct SignalHub<T> {
    listeners: RefCell<Vec<Listener<T>>>,
}

impl<T> Default for SignalHub<T> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl<T> SignalHub<T> {
    /// Register a listener; listeners run in registration order.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Deliver `value` to every listener registered before this call.
    pub fn publish(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener(value);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn listeners_run_in_order() {
        let hub = SignalHub::<InitScope>::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = Rc::clone(&seen);
            hub.subscribe(move |scope: &InitScope| {
                seen.borrow_mut().push(format!("{tag}:{scope:?}"));
            });
        }
        hub.publish(&InitScope::Region("#main".into()));
        assert_eq!(
            *seen.borrow(),
            vec![
                "a:Region(\"#main\")".to_string(),
                "b:Region(\"#main\")".to_string()
            ]
        );
    }

    #[test]
    fn subscribing_during_publish_is_deferred() {
        let hub = Rc::new(SignalHub::<BusStatus>::default());
        let calls = Rc::new(Cell::new(0));
        {
            let inner_hub = Rc::clone(&hub);
            let calls = Rc::clone(&calls);
            hub.subscribe(move |_| {
                let calls = Rc::clone(&calls);
                calls.set(calls.get() + 1);
                inner_hub.subscribe(move |_| calls.set(calls.get() + 10));
            });
        }
        hub.publish(&BusStatus::Open);
        assert_eq!(calls.get(), 1);
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn scope_selector() {
        assert_eq!(InitScope::Page.selector(), None);
        assert_eq!(InitScope::Region("#x".into()).selector(), Some("#x"));
    }
}
