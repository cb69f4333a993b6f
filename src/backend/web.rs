//! Browser-backed storage areas (wasm32 only).
//!
//! - `DomStorageArea` wraps `window.localStorage` / `window.sessionStorage`
//! - `DomCookieArea` wraps `document.cookie` through the wire codec
//!
//! Every operation looks the medium up fresh: storage can be present on one
//! call and gone on the next (private browsing, sandboxed frames), and a
//! missing medium is reported as [`StorageError::Unavailable`] rather than a
//! panic.

use wasm_bindgen::prelude::*;
use web_sys::{HtmlDocument, Storage, StorageEvent};

use super::{AreaChange, StorageArea, WatchFn, WatchGuard};
use crate::cookie::{self, CookieAttributes};
use crate::error::StorageError;

fn js_error_message(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// `localStorage` or `sessionStorage`, looked up per call.
#[derive(Debug, Clone, Copy)]
pub struct DomStorageArea {
    session: bool,
}

impl DomStorageArea {
    pub fn local() -> Self {
        Self { session: false }
    }

    pub fn session() -> Self {
        Self { session: true }
    }

    fn storage(&self) -> Option<Storage> {
        let window = web_sys::window()?;
        if self.session {
            window.session_storage().ok().flatten()
        } else {
            window.local_storage().ok().flatten()
        }
    }
}

impl StorageArea for DomStorageArea {
    fn read(&self, key: &str) -> Option<String> {
        self.storage()?.get_item(key).ok().flatten()
    }

    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        let Some(storage) = self.storage() else {
            return Err(StorageError::Unavailable(
                "no web storage in this context".to_string(),
            ));
        };
        storage
            .set_item(key, raw)
            .map_err(|err| StorageError::Rejected(js_error_message(&err)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let Some(storage) = self.storage() else {
            return Err(StorageError::Unavailable(
                "no web storage in this context".to_string(),
            ));
        };
        storage
            .remove_item(key)
            .map_err(|err| StorageError::Rejected(js_error_message(&err)))
    }

    fn watch(&self, key: &str, mut callback: WatchFn) -> Option<WatchGuard> {
        // only localStorage broadcasts between documents
        if self.session {
            return None;
        }
        let window = web_sys::window()?;
        let own = *self;
        let watched = key.to_string();

        let closure = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
            if event.key().as_deref() != Some(watched.as_str()) {
                return;
            }
            // sessionStorage fires the same event type on this window;
            // verify the event's area against our own medium, looked up
            // fresh like every other operation, and drop events whose
            // area cannot be verified
            match (own.storage(), event.storage_area()) {
                (Some(ours), Some(theirs)) if ours == theirs => {}
                _ => return,
            }
            callback(AreaChange {
                key: watched.clone(),
                new_value: event.new_value(),
            });
        });

        if let Err(err) =
            window.add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
        {
            log::warn!("storage event listener rejected: {}", js_error_message(&err));
            return None;
        }

        // the listener lives exactly as long as the guard
        Some(WatchGuard::new(move || {
            let _ = window
                .remove_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
            drop(closure);
        }))
    }
}

/// `document.cookie`, one record per key via the wire codec.
#[derive(Debug, Clone, Copy)]
pub struct DomCookieArea {
    expire_days: f64,
}

impl DomCookieArea {
    pub fn new(expire_days: f64) -> Self {
        Self { expire_days }
    }

    fn html_document() -> Option<HtmlDocument> {
        web_sys::window()?.document()?.dyn_into::<HtmlDocument>().ok()
    }
}

impl StorageArea for DomCookieArea {
    fn read(&self, key: &str) -> Option<String> {
        let header = Self::html_document()?.cookie().ok()?;
        cookie::get(&header, key)
    }

    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        let Some(document) = Self::html_document() else {
            return Err(StorageError::Unavailable(
                "no document in this context".to_string(),
            ));
        };
        let attrs = CookieAttributes::from_expire_days(self.expire_days);
        document
            .set_cookie(&cookie::build(key, raw, &attrs))
            .map_err(|err| StorageError::Rejected(js_error_message(&err)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let Some(document) = Self::html_document() else {
            return Err(StorageError::Unavailable(
                "no document in this context".to_string(),
            ));
        };
        document
            .set_cookie(&cookie::build(key, "", &CookieAttributes::expired()))
            .map_err(|err| StorageError::Rejected(js_error_message(&err)))
    }

    fn watch(&self, _key: &str, _callback: WatchFn) -> Option<WatchGuard> {
        // cookies have no change event
        None
    }
}
