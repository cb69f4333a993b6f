//! Storage backend abstraction.
//!
//! Every medium (local storage, session storage, a cookie) is the same
//! tiny capability set: read, write, and remove one raw string by key, plus
//! an optional change watch where the platform has a notification stream
//! (local storage only). Failure is policy, not exception: an absent medium
//! reads as absent and writes as [`StorageError::Unavailable`], a refusing
//! medium writes as [`StorageError::Rejected`], and nothing in this layer
//! panics.
//!
//! Areas are handed to cells as explicit `Rc<dyn StorageArea>` values, never
//! reached as process-wide globals from inside the engine; that is what lets
//! tests substitute [`MemoryArea`] for the real DOM.

pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::fmt;
use std::rc::Rc;

use crate::error::StorageError;

pub use memory::{MemoryArea, MemoryCookieArea};
#[cfg(target_arch = "wasm32")]
pub use web::{DomCookieArea, DomStorageArea};

/// Which persistence medium backs a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Local storage: survives reloads, shared across tabs, has a change
    /// notification stream.
    #[default]
    Local,
    /// Session storage: survives reloads within one tab, never shared.
    Session,
    /// A single cookie with a configurable expiry.
    Cookie,
}

/// A change observed on the medium, as delivered to a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaChange {
    /// Storage key the change applies to.
    pub key: String,
    /// The raw value now in the medium; `None` means the record was deleted.
    pub new_value: Option<String>,
}

/// Callback invoked when a foreign writer changes a watched key.
pub type WatchFn = Box<dyn FnMut(AreaChange)>;

/// Releases a watch subscription when dropped.
///
/// Holding the guard is what keeps the subscription alive; dropping it
/// deregisters the listener, so repeated construct/teardown cycles never
/// accumulate listeners on the medium.
pub struct WatchGuard {
    release: Option<Box<dyn FnOnce()>>,
}

impl WatchGuard {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard").finish_non_exhaustive()
    }
}

/// Capability set every storage medium implements.
pub trait StorageArea {
    /// Current raw value under `key`.
    ///
    /// `None` covers both a key that was never set and a medium that is not
    /// available in this context; reading never fails loudly.
    fn read(&self, key: &str) -> Option<String>;

    /// Replace the raw value under `key`. Full-record replacement only.
    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError>;

    /// Delete the record under `key`.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to foreign changes of `key`.
    ///
    /// Returns `None` where the medium has no change stream (session and
    /// cookie variants). The subscription lives until the guard drops.
    fn watch(&self, key: &str, callback: WatchFn) -> Option<WatchGuard>;
}

/// The ambient area backing `kind` in this execution context.
///
/// On wasm32 these are the real DOM mediums. Everywhere else they are
/// per-process in-memory stand-ins shared by every cell of the same kind, so
/// two same-key cells still observe one record, the concrete form of
/// degrading to in-memory-only behavior.
pub fn ambient(kind: StorageKind, cookie_expire_days: f64) -> Rc<dyn StorageArea> {
    ambient_impl(kind, cookie_expire_days)
}

#[cfg(target_arch = "wasm32")]
fn ambient_impl(kind: StorageKind, cookie_expire_days: f64) -> Rc<dyn StorageArea> {
    match kind {
        StorageKind::Local => Rc::new(DomStorageArea::local()),
        StorageKind::Session => Rc::new(DomStorageArea::session()),
        StorageKind::Cookie => Rc::new(DomCookieArea::new(cookie_expire_days)),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn ambient_impl(kind: StorageKind, cookie_expire_days: f64) -> Rc<dyn StorageArea> {
    use crate::cookie::CookieJar;

    thread_local! {
        static LOCAL: Rc<MemoryArea> = Rc::new(MemoryArea::new());
        static SESSION: Rc<MemoryArea> = Rc::new(MemoryArea::new());
        static JAR: Rc<CookieJar> = Rc::new(CookieJar::new());
    }

    match kind {
        StorageKind::Local => LOCAL.with(|area| area.clone() as Rc<dyn StorageArea>),
        StorageKind::Session => SESSION.with(|area| area.clone() as Rc<dyn StorageArea>),
        StorageKind::Cookie => {
            let jar = JAR.with(Rc::clone);
            Rc::new(MemoryCookieArea::new(jar, cookie_expire_days))
        }
    }
}
