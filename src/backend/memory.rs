//! In-memory storage areas.
//!
//! `MemoryArea` is a faithful stand-in for a web storage medium: a shared
//! string map plus a change-notification fan-out. It backs cells natively
//! (where no DOM exists) and substitutes for the DOM in tests, where
//! [`MemoryArea::emit_foreign_change`] plays the part of another tab writing
//! to the shared medium. Like the real thing, an area never notifies its own
//! writer: the storage event fires only in *other* documents, and local
//! writes here skip the listener list the same way.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{AreaChange, StorageArea, WatchFn, WatchGuard};
use crate::cookie::{self, CookieAttributes, CookieJar};
use crate::error::StorageError;

struct ListenerSlot {
    key: String,
    /// Cleared on release so a slot captured by an in-flight delivery
    /// snapshot cannot fire after its guard dropped.
    active: Cell<bool>,
    callback: RefCell<WatchFn>,
}

type ListenerList = Rc<RefCell<Vec<Rc<ListenerSlot>>>>;

/// In-memory string-keyed medium with a per-key change watch.
#[derive(Default)]
pub struct MemoryArea {
    entries: RefCell<HashMap<String, String>>,
    listeners: ListenerList,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a foreign document writing to the shared medium: apply the
    /// change to the map, then deliver it to every watcher of `key`.
    /// `None` plays a foreign deletion.
    pub fn emit_foreign_change(&self, key: &str, new_value: Option<&str>) {
        match new_value {
            Some(value) => {
                self.entries.borrow_mut().insert(key.to_string(), value.to_string());
            }
            None => {
                self.entries.borrow_mut().remove(key);
            }
        }

        let change = AreaChange {
            key: key.to_string(),
            new_value: new_value.map(str::to_string),
        };
        // snapshot first: a callback may drop its own or another guard while
        // the delivery is in flight
        let slots: Vec<Rc<ListenerSlot>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|slot| slot.key == key)
            .cloned()
            .collect();
        for slot in slots {
            if slot.active.get() {
                (*slot.callback.borrow_mut())(change.clone());
            }
        }
    }

    /// Number of live watch subscriptions, across all keys.
    pub fn watcher_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl fmt::Debug for MemoryArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryArea")
            .field("entries", &self.entries.borrow().len())
            .field("watchers", &self.watcher_count())
            .finish()
    }
}

impl StorageArea for MemoryArea {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().insert(key.to_string(), raw.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn watch(&self, key: &str, callback: WatchFn) -> Option<WatchGuard> {
        let slot = Rc::new(ListenerSlot {
            key: key.to_string(),
            active: Cell::new(true),
            callback: RefCell::new(callback),
        });
        self.listeners.borrow_mut().push(Rc::clone(&slot));

        let list: Weak<RefCell<Vec<Rc<ListenerSlot>>>> = Rc::downgrade(&self.listeners);
        Some(WatchGuard::new(move || {
            slot.active.set(false);
            if let Some(list) = list.upgrade() {
                list.borrow_mut().retain(|other| !Rc::ptr_eq(other, &slot));
            }
        }))
    }
}

/// Cookie medium over an in-memory [`CookieJar`].
///
/// Runs the same wire-format codec as the DOM-backed cookie area, against a
/// jar instead of `document.cookie`. Cookies have no change notification
/// stream, so `watch` is always `None`.
pub struct MemoryCookieArea {
    jar: Rc<CookieJar>,
    expire_days: f64,
}

impl MemoryCookieArea {
    pub fn new(jar: Rc<CookieJar>, expire_days: f64) -> Self {
        Self { jar, expire_days }
    }
}

impl fmt::Debug for MemoryCookieArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCookieArea")
            .field("expire_days", &self.expire_days)
            .finish_non_exhaustive()
    }
}

impl StorageArea for MemoryCookieArea {
    fn read(&self, key: &str) -> Option<String> {
        cookie::get(&self.jar.cookie_header(), key)
    }

    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        let attrs = CookieAttributes::from_expire_days(self.expire_days);
        self.jar.assign(&cookie::build(key, raw, &attrs));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.jar.assign(&cookie::build(key, "", &CookieAttributes::expired()));
        Ok(())
    }

    fn watch(&self, _key: &str, _callback: WatchFn) -> Option<WatchGuard> {
        None
    }
}
