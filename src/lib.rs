//! stash-cell - Persisted, tab-synchronized state cells
//!
//! A [`StashCell`] is a program value transparently backed by a browser
//! medium (local storage, session storage, or a cookie). It survives page
//! reloads and, over local storage, follows writes made by other tabs.
//!
//! Core modules:
//! - `cell`: The value container, its builder, and the hook plumbing
//! - `backend`: Storage areas (DOM-backed on wasm32, in-memory elsewhere)
//! - `serializer`: Pluggable value/string codec, JSON by default
//! - `cookie`: Document-cookie wire format and an expiring jar emulator
//! - `error`: Typed storage and codec failures

pub mod backend;
pub mod cell;
pub mod cookie;
pub mod error;
pub mod serializer;

mod sync;

pub use backend::{AreaChange, MemoryArea, StorageArea, StorageKind, WatchGuard};
pub use cell::{StashBuilder, StashCell};
pub use error::{CodecError, StorageError, WriteError};
pub use serializer::{JsonCodec, Serializer};

/// Storage defaults
pub mod consts {
    /// Cookie lifetime when none is configured
    pub const DEFAULT_COOKIE_EXPIRE_DAYS: f64 = 365.0;
    /// Cookies are always scoped to the site root
    pub const COOKIE_PATH: &str = "/";
    pub const SECONDS_PER_DAY: i64 = 86_400;
}
