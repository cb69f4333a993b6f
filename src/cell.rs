//! Persisted state cells.
//!
//! [`StashCell`] is the piece callers hold: one logical value under one
//! storage key, read from the medium at construction and pushed back on every
//! set. The cell composes the serializer, the storage area, and the cross-tab
//! subscription behind a plain get/set/reset surface.
//!
//! Failure policy, in one place:
//!
//! - an absent medium degrades the cell to memory-only (logged, no hooks)
//! - a record that will not parse falls back to the initial value and is
//!   reported through `on_parse_error`
//! - a rejected write keeps the already-updated in-memory value and is
//!   reported through `on_write_error`
//!
//! None of these surface as panics or `Err` from the public methods.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::{self, StorageArea, StorageKind, WatchGuard};
use crate::consts::DEFAULT_COOKIE_EXPIRE_DAYS;
use crate::error::{CodecError, WriteError};
use crate::serializer::{JsonCodec, Serializer};
use crate::sync;

type ReadTransform = Box<dyn FnMut(String) -> String>;
type WriteTransform<T> = Box<dyn FnMut(T) -> T>;
type ParseErrorHook = Box<dyn FnMut(&CodecError, &str)>;
type WriteErrorHook = Box<dyn FnMut(&WriteError)>;

struct CellState<T> {
    current: T,
    /// Raw string this instance believes the medium currently holds under
    /// its key. Compared against incoming notifications to drop echoes;
    /// `None` until something was read or written.
    last_written: Option<String>,
}

/// State shared between a cell and its change subscription.
pub(crate) struct Shared<T> {
    key: String,
    initial: T,
    serializer: Box<dyn Serializer<T>>,
    before_read: Option<RefCell<ReadTransform>>,
    before_write: Option<RefCell<WriteTransform<T>>>,
    on_parse_error: Option<RefCell<ParseErrorHook>>,
    on_write_error: Option<RefCell<WriteErrorHook>>,
    state: RefCell<CellState<T>>,
}

impl<T: Clone> Shared<T> {
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn initial_clone(&self) -> T {
        self.initial.clone()
    }

    pub(crate) fn matches_last_written(&self, raw: Option<&str>) -> bool {
        self.state.borrow().last_written.as_deref() == raw
    }

    /// Replace the live value and the medium-raw belief in one step.
    pub(crate) fn install(&self, value: T, last_written: Option<String>) {
        let mut state = self.state.borrow_mut();
        state.current = value;
        state.last_written = last_written;
    }

    /// Parse a raw record, falling back to the initial value on failure.
    /// The parse-error hook sees the raw exactly as the medium returned it,
    /// before any read transform.
    pub(crate) fn parse_with_fallback(&self, raw: &str) -> T {
        let parsed = match &self.before_read {
            Some(hook) => {
                let transformed = (*hook.borrow_mut())(raw.to_string());
                self.serializer.parse(&transformed)
            }
            None => self.serializer.parse(raw),
        };
        match parsed {
            Ok(value) => value,
            Err(err) => {
                match &self.on_parse_error {
                    Some(hook) => (*hook.borrow_mut())(&err, raw),
                    None => log::warn!("failed to parse record for '{}': {err}", self.key),
                }
                self.initial.clone()
            }
        }
    }

    /// Push the current value into the medium. Failures never alter
    /// `current`; an unavailable medium is a silent degrade, anything else
    /// goes through the write-error hook.
    fn persist(&self, area: &dyn StorageArea) {
        let raw = {
            let state = self.state.borrow();
            self.serializer.stringify(&state.current)
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                self.report_write_error(&WriteError::Serialize(err));
                return;
            }
        };
        match area.write(&self.key, &raw) {
            Ok(()) => {
                self.state.borrow_mut().last_written = Some(raw);
            }
            Err(err) if err.is_unavailable() => {
                log::debug!("storage unavailable, keeping '{}' in memory only", self.key);
            }
            Err(err) => {
                self.report_write_error(&WriteError::Storage(err));
            }
        }
    }

    fn report_write_error(&self, err: &WriteError) {
        match &self.on_write_error {
            Some(hook) => (*hook.borrow_mut())(err),
            None => log::warn!("failed to persist '{}': {err}", self.key),
        }
    }
}

/// A program value transparently backed by a persistent browser medium.
///
/// Reads are served from memory; every set goes through the configured
/// backend; with local storage and `sync_tabs` enabled, writes made by other
/// tabs flow back in through a change subscription. Dropping the cell
/// releases that subscription.
pub struct StashCell<T> {
    shared: Rc<Shared<T>>,
    area: Rc<dyn StorageArea>,
    watch: Option<WatchGuard>,
}

impl<T> StashCell<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    /// Cell over the ambient medium of the default kind (local storage) with
    /// the default JSON codec and default options.
    pub fn new(key: impl Into<String>, initial: T) -> Self {
        Self::builder(key, initial).build()
    }

    /// Start configuring a cell with the default JSON codec.
    pub fn builder(key: impl Into<String>, initial: T) -> StashBuilder<T> {
        StashBuilder::with_serializer(key, initial, JsonCodec)
    }
}

impl<T: Clone> StashCell<T> {
    /// Clone of the live value.
    pub fn get(&self) -> T {
        self.shared.state.borrow().current.clone()
    }

    /// Run `f` against a borrow of the live value, without cloning. The
    /// borrow is held while `f` runs, so `f` must not call back into the
    /// cell's setters.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.state.borrow().current)
    }

    /// Replace the value and persist it.
    ///
    /// The in-memory value changes first; if the medium then rejects the
    /// write, the cell keeps the new value and reports through the
    /// write-error hook. No rollback.
    pub fn set(&self, value: T) {
        let value = match &self.shared.before_write {
            Some(hook) => (*hook.borrow_mut())(value),
            None => value,
        };
        self.shared.state.borrow_mut().current = value;
        self.shared.persist(self.area.as_ref());
    }

    /// Derive the next value from the current one and set it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.get();
        self.set(f(&current));
    }

    /// Restore the construction-time value, persisting it like any other
    /// write.
    pub fn reset(&self) {
        self.set(self.shared.initial.clone());
    }

    /// Storage key this cell is addressed by.
    pub fn key(&self) -> &str {
        self.shared.key()
    }

    /// The construction-time snapshot `reset` restores.
    pub fn initial(&self) -> &T {
        &self.shared.initial
    }

    /// Whether this cell listens for changes made by other tabs.
    pub fn is_synced(&self) -> bool {
        self.watch.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for StashCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StashCell")
            .field("key", &self.shared.key)
            .field("value", &self.shared.state.borrow().current)
            .field("synced", &self.watch.is_some())
            .finish_non_exhaustive()
    }
}

/// Configures and builds a [`StashCell`].
///
/// All options have defaults; only the key and initial value are required.
/// Obtained from [`StashCell::builder`] for serde value types, or
/// [`StashBuilder::with_serializer`] for a custom codec.
///
/// Hooks and transforms run inline on the calling context, after the cell's
/// own state is already consistent; a hook that panics unwinds to the caller
/// of the operation that triggered it.
pub struct StashBuilder<T> {
    key: String,
    initial: T,
    storage: StorageKind,
    sync_tabs: bool,
    cookie_expire_days: f64,
    serializer: Box<dyn Serializer<T>>,
    area: Option<Rc<dyn StorageArea>>,
    before_read: Option<ReadTransform>,
    before_write: Option<WriteTransform<T>>,
    on_parse_error: Option<ParseErrorHook>,
    on_write_error: Option<WriteErrorHook>,
}

impl<T: Clone + 'static> StashBuilder<T> {
    /// Builder over a caller-supplied codec, for value types the default
    /// JSON codec cannot carry.
    pub fn with_serializer(
        key: impl Into<String>,
        initial: T,
        serializer: impl Serializer<T> + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            initial,
            storage: StorageKind::default(),
            sync_tabs: true,
            cookie_expire_days: DEFAULT_COOKIE_EXPIRE_DAYS,
            serializer: Box::new(serializer),
            area: None,
            before_read: None,
            before_write: None,
            on_parse_error: None,
            on_write_error: None,
        }
    }

    /// Which medium backs the cell. Defaults to local storage.
    pub fn storage(mut self, kind: StorageKind) -> Self {
        self.storage = kind;
        self
    }

    /// Follow changes made by other tabs. Defaults to true; only effective
    /// for local storage, the one medium with a change stream.
    pub fn sync_tabs(mut self, sync: bool) -> Self {
        self.sync_tabs = sync;
        self
    }

    /// Cookie lifetime in days (fractions allowed). Defaults to 365.
    pub fn cookie_expire_days(mut self, days: f64) -> Self {
        self.cookie_expire_days = days;
        self
    }

    /// Swap the codec.
    pub fn serializer(mut self, serializer: impl Serializer<T> + 'static) -> Self {
        self.serializer = Box::new(serializer);
        self
    }

    /// Back the cell with an explicit area instead of the ambient medium of
    /// the configured kind.
    pub fn area(mut self, area: Rc<dyn StorageArea>) -> Self {
        self.area = Some(area);
        self
    }

    /// Transform the raw record after it is read, before parsing.
    pub fn before_read(mut self, f: impl FnMut(String) -> String + 'static) -> Self {
        self.before_read = Some(Box::new(f));
        self
    }

    /// Transform the value before it is applied and stored.
    pub fn before_write(mut self, f: impl FnMut(T) -> T + 'static) -> Self {
        self.before_write = Some(Box::new(f));
        self
    }

    /// Called when a stored or foreign record fails to parse, with the raw
    /// string as read from the medium.
    pub fn on_parse_error(mut self, f: impl FnMut(&CodecError, &str) + 'static) -> Self {
        self.on_parse_error = Some(Box::new(f));
        self
    }

    /// Called when a value cannot be stringified or the medium rejects a
    /// write. Not called for an unavailable medium.
    pub fn on_write_error(mut self, f: impl FnMut(&WriteError) + 'static) -> Self {
        self.on_write_error = Some(Box::new(f));
        self
    }

    /// Read the medium, seed it if empty, and subscribe when applicable.
    /// Construction never fails: a malformed record falls back to the
    /// initial value, an absent medium leaves the cell memory-only.
    pub fn build(self) -> StashCell<T> {
        let area = match self.area {
            Some(area) => area,
            None => backend::ambient(self.storage, self.cookie_expire_days),
        };
        let shared = Rc::new(Shared {
            key: self.key,
            initial: self.initial.clone(),
            serializer: self.serializer,
            before_read: self.before_read.map(RefCell::new),
            before_write: self.before_write.map(RefCell::new),
            on_parse_error: self.on_parse_error.map(RefCell::new),
            on_write_error: self.on_write_error.map(RefCell::new),
            state: RefCell::new(CellState {
                current: self.initial,
                last_written: None,
            }),
        });

        let mut cell = StashCell {
            shared,
            area,
            watch: None,
        };

        match cell.area.read(cell.shared.key()) {
            Some(raw) => {
                let value = cell.shared.parse_with_fallback(&raw);
                cell.shared.install(value, Some(raw));
            }
            None => {
                log::debug!("no record for '{}', seeding initial value", cell.shared.key());
                cell.set(cell.shared.initial_clone());
            }
        }

        if self.storage == StorageKind::Local && self.sync_tabs {
            cell.watch = sync::subscribe(&cell.area, &cell.shared);
        }

        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use proptest::prelude::*;
    use serde::Deserialize;

    use crate::backend::{MemoryArea, MemoryCookieArea, WatchFn};
    use crate::cookie::CookieJar;
    use crate::error::StorageError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        volume: u8,
    }

    fn prefs(theme: &str, volume: u8) -> Prefs {
        Prefs {
            theme: theme.to_string(),
            volume,
        }
    }

    /// Serves reads but rejects every write, like a medium over quota.
    struct RejectingArea {
        inner: MemoryArea,
    }

    impl StorageArea for RejectingArea {
        fn read(&self, key: &str) -> Option<String> {
            self.inner.read(key)
        }

        fn write(&self, _key: &str, _raw: &str) -> Result<(), StorageError> {
            Err(StorageError::Rejected("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Rejected("quota exceeded".to_string()))
        }

        fn watch(&self, key: &str, callback: WatchFn) -> Option<WatchGuard> {
            self.inner.watch(key, callback)
        }
    }

    /// A context with no storage at all.
    struct OfflineArea;

    impl StorageArea for OfflineArea {
        fn read(&self, _key: &str) -> Option<String> {
            None
        }

        fn write(&self, _key: &str, _raw: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("no storage".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("no storage".to_string()))
        }

        fn watch(&self, _key: &str, _callback: WatchFn) -> Option<WatchGuard> {
            None
        }
    }

    /// Counts writes reaching the medium, for no-echo assertions.
    struct CountingArea {
        inner: Rc<MemoryArea>,
        writes: Rc<Cell<usize>>,
    }

    impl StorageArea for CountingArea {
        fn read(&self, key: &str) -> Option<String> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.write(key, raw)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }

        fn watch(&self, key: &str, callback: WatchFn) -> Option<WatchGuard> {
            self.inner.watch(key, callback)
        }
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("prefs", prefs("light", 3))
            .area(area.clone())
            .build();

        cell.set(prefs("dark", 9));
        assert_eq!(cell.get(), prefs("dark", 9));
        assert_eq!(
            area.read("prefs").as_deref(),
            Some(r#"{"theme":"dark","volume":9}"#)
        );
    }

    #[test]
    fn test_construction_seeds_missing_record() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("counter", 0i64).area(area.clone()).build();

        assert_eq!(cell.get(), 0);
        assert_eq!(area.read("counter").as_deref(), Some("0"));
    }

    #[test]
    fn test_construction_adopts_existing_record() {
        let area: Rc<MemoryArea> = Rc::default();
        area.write("counter", "5").unwrap();

        let cell = StashCell::builder("counter", 0i64).area(area.clone()).build();
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn test_reset_restores_construction_value_and_persists() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("prefs", prefs("light", 3))
            .area(area.clone())
            .build();

        cell.set(prefs("dark", 9));
        cell.set(prefs("sepia", 1));
        cell.reset();

        assert_eq!(cell.get(), prefs("light", 3));
        assert_eq!(cell.initial(), &prefs("light", 3));
        assert_eq!(
            area.read("prefs").as_deref(),
            Some(r#"{"theme":"light","volume":3}"#)
        );
    }

    #[test]
    fn test_update_goes_through_write_path() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("counter", 0i64).area(area.clone()).build();

        cell.update(|n| n + 1);
        cell.update(|n| n + 1);

        assert_eq!(cell.get(), 2);
        assert_eq!(area.read("counter").as_deref(), Some("2"));
    }

    #[test]
    fn test_with_borrows_without_cloning() {
        let cell = StashCell::builder("prefs", prefs("light", 3))
            .area(Rc::new(MemoryArea::new()))
            .build();

        assert_eq!(cell.with(|p| p.theme.len()), 5);
    }

    #[test]
    fn test_unparsable_record_falls_back_to_initial() {
        let area: Rc<MemoryArea> = Rc::default();
        area.write("prefs", "{not json").unwrap();

        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = seen.clone();
        let cell = StashCell::builder("prefs", prefs("light", 3))
            .area(area.clone())
            .on_parse_error(move |_err, raw| sink.borrow_mut().push(raw.to_string()))
            .build();

        assert_eq!(cell.get(), prefs("light", 3));
        assert_eq!(seen.borrow().as_slice(), ["{not json"]);
        // the fallback is not written back; the record stays as the medium
        // held it
        assert_eq!(area.read("prefs").as_deref(), Some("{not json"));
    }

    #[test]
    fn test_parse_error_hook_sees_raw_as_stored() {
        let area: Rc<MemoryArea> = Rc::default();
        area.write("counter", "v1:wat").unwrap();

        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = seen.clone();
        let cell = StashCell::builder("counter", 0i64)
            .area(area.clone())
            .before_read(|raw| raw.strip_prefix("v1:").map(str::to_string).unwrap_or(raw))
            .on_parse_error(move |_err, raw| sink.borrow_mut().push(raw.to_string()))
            .build();

        assert_eq!(cell.get(), 0);
        // the hook reports the record as stored, not the transformed form
        assert_eq!(seen.borrow().as_slice(), ["v1:wat"]);
    }

    #[test]
    fn test_before_read_transform_applies_before_parse() {
        let area: Rc<MemoryArea> = Rc::default();
        area.write("counter", "v1:7").unwrap();

        let cell = StashCell::builder("counter", 0i64)
            .area(area.clone())
            .before_read(|raw| raw.strip_prefix("v1:").map(str::to_string).unwrap_or(raw))
            .build();

        assert_eq!(cell.get(), 7);
    }

    #[test]
    fn test_before_write_transform_shapes_stored_value() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("volume", 5i64)
            .area(area.clone())
            .before_write(|v: i64| v.clamp(0, 10))
            .build();

        cell.set(99);
        assert_eq!(cell.get(), 10);
        assert_eq!(area.read("volume").as_deref(), Some("10"));
    }

    #[test]
    fn test_rejected_write_keeps_optimistic_value() {
        let inner = MemoryArea::new();
        inner.write("counter", "1").unwrap();
        let area = Rc::new(RejectingArea { inner });

        let write_errors = Rc::new(Cell::new(0));
        let sink = write_errors.clone();
        let cell = StashCell::builder("counter", 0i64)
            .area(area.clone())
            .on_write_error(move |_err| sink.set(sink.get() + 1))
            .build();
        assert_eq!(cell.get(), 1);

        cell.set(2);
        // the live value moved on; the record did not
        assert_eq!(cell.get(), 2);
        assert_eq!(write_errors.get(), 1);
        assert_eq!(area.read("counter").as_deref(), Some("1"));
    }

    #[test]
    fn test_stringify_failure_routed_to_write_hook() {
        struct BrokenStringify;

        impl Serializer<i64> for BrokenStringify {
            fn parse(&self, raw: &str) -> Result<i64, CodecError> {
                raw.parse().map_err(|_| CodecError::new("bad number"))
            }

            fn stringify(&self, _value: &i64) -> Result<String, CodecError> {
                Err(CodecError::new("refusing to stringify"))
            }
        }

        let area: Rc<MemoryArea> = Rc::default();
        area.write("n", "1").unwrap();

        let serialize_errors = Rc::new(Cell::new(0));
        let sink = serialize_errors.clone();
        let cell = StashBuilder::with_serializer("n", 0i64, BrokenStringify)
            .area(area.clone())
            .on_write_error(move |err| {
                assert!(matches!(err, WriteError::Serialize(_)));
                sink.set(sink.get() + 1);
            })
            .build();

        cell.set(5);
        assert_eq!(cell.get(), 5);
        assert_eq!(serialize_errors.get(), 1);
        assert_eq!(area.read("n").as_deref(), Some("1"));
    }

    #[test]
    fn test_unavailable_storage_degrades_to_memory_only() {
        let hook_hits = Rc::new(Cell::new(0));
        let sink = hook_hits.clone();
        let cell = StashCell::builder("counter", 0i64)
            .area(Rc::new(OfflineArea))
            .on_write_error(move |_err| sink.set(sink.get() + 1))
            .build();

        cell.set(5);
        assert_eq!(cell.get(), 5);
        // unavailability is a degrade, not an error
        assert_eq!(hook_hits.get(), 0);
    }

    #[test]
    fn test_foreign_change_applies_without_write_back() {
        let inner: Rc<MemoryArea> = Rc::default();
        let writes = Rc::new(Cell::new(0));
        let area = Rc::new(CountingArea {
            inner: inner.clone(),
            writes: writes.clone(),
        });

        let cell = StashCell::builder("counter", 0i64).area(area).build();
        assert_eq!(writes.get(), 1); // seeding

        cell.set(5);
        assert_eq!(writes.get(), 2);

        inner.emit_foreign_change("counter", Some("10"));
        assert_eq!(cell.get(), 10);
        assert_eq!(writes.get(), 2);
    }

    #[test]
    fn test_own_echo_is_ignored() {
        let area: Rc<MemoryArea> = Rc::default();
        let parses = Rc::new(Cell::new(0));
        let sink = parses.clone();
        let cell = StashCell::builder("counter", 0i64)
            .area(area.clone())
            .before_read(move |raw| {
                sink.set(sink.get() + 1);
                raw
            })
            .build();

        cell.set(5);
        // a bus replaying our own write must not re-enter the cell
        area.emit_foreign_change("counter", Some("5"));

        assert_eq!(cell.get(), 5);
        assert_eq!(parses.get(), 0);
    }

    #[test]
    fn test_foreign_deletion_restores_initial_in_memory() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("counter", 0i64).area(area.clone()).build();
        cell.set(5);

        area.emit_foreign_change("counter", None);
        assert_eq!(cell.get(), 0);
        // deletion elsewhere is not answered with a re-seed
        assert_eq!(area.read("counter"), None);
    }

    #[test]
    fn test_malformed_foreign_change_falls_back() {
        let area: Rc<MemoryArea> = Rc::default();
        let parse_errors = Rc::new(Cell::new(0));
        let sink = parse_errors.clone();
        let cell = StashCell::builder("counter", 0i64)
            .area(area.clone())
            .on_parse_error(move |_err, _raw| sink.set(sink.get() + 1))
            .build();
        cell.set(5);

        area.emit_foreign_change("counter", Some("wat"));
        assert_eq!(cell.get(), 0);
        assert_eq!(parse_errors.get(), 1);
    }

    #[test]
    fn test_sync_disabled_never_subscribes() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("counter", 0i64)
            .area(area.clone())
            .sync_tabs(false)
            .build();
        cell.set(5);

        assert!(!cell.is_synced());
        assert_eq!(area.watcher_count(), 0);

        area.emit_foreign_change("counter", Some("10"));
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn test_session_kind_never_subscribes() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("counter", 0i64)
            .storage(StorageKind::Session)
            .area(area.clone())
            .build();

        assert!(!cell.is_synced());
        assert_eq!(area.watcher_count(), 0);
    }

    #[test]
    fn test_same_key_cells_share_the_medium() {
        let area: Rc<MemoryArea> = Rc::default();
        let a = StashCell::builder("counter", 0i64).area(area.clone()).build();
        let b = StashCell::builder("counter", 0i64).area(area.clone()).build();

        // same-document writes do not notify; b stays on its snapshot
        a.set(5);
        assert_eq!(area.read("counter").as_deref(), Some("5"));
        assert_eq!(b.get(), 0);

        // a foreign write reaches every subscribed cell
        area.emit_foreign_change("counter", Some("7"));
        assert_eq!(a.get(), 7);
        assert_eq!(b.get(), 7);
    }

    #[test]
    fn test_dropping_cell_releases_subscription() {
        let area: Rc<MemoryArea> = Rc::default();
        let cell = StashCell::builder("counter", 0i64).area(area.clone()).build();
        assert!(cell.is_synced());
        assert_eq!(area.watcher_count(), 1);

        drop(cell);
        assert_eq!(area.watcher_count(), 0);
        // a late notification reaches nothing and harms nothing
        area.emit_foreign_change("counter", Some("10"));
    }

    #[test]
    fn test_custom_serializer_replaces_json() {
        #[derive(Debug, Clone, PartialEq)]
        struct Point {
            x: i32,
            y: i32,
        }

        struct PointCodec;

        impl Serializer<Point> for PointCodec {
            fn parse(&self, raw: &str) -> Result<Point, CodecError> {
                let (x, y) = raw.split_once(',').ok_or_else(|| CodecError::new("expected x,y"))?;
                Ok(Point {
                    x: x.trim().parse().map_err(|_| CodecError::new("bad x"))?,
                    y: y.trim().parse().map_err(|_| CodecError::new("bad y"))?,
                })
            }

            fn stringify(&self, value: &Point) -> Result<String, CodecError> {
                Ok(format!("{},{}", value.x, value.y))
            }
        }

        let area: Rc<MemoryArea> = Rc::default();
        area.write("origin", "3,4").unwrap();

        let cell = StashBuilder::with_serializer("origin", Point { x: 0, y: 0 }, PointCodec)
            .area(area.clone())
            .build();
        assert_eq!(cell.get(), Point { x: 3, y: 4 });

        cell.set(Point { x: 5, y: 6 });
        assert_eq!(area.read("origin").as_deref(), Some("5,6"));
    }

    #[test]
    fn test_cookie_cells_round_trip_and_expire() {
        let jar = Rc::new(CookieJar::new());
        let area = Rc::new(MemoryCookieArea::new(jar.clone(), 1.0));

        let cell = StashCell::builder("prefs", prefs("light", 3))
            .storage(StorageKind::Cookie)
            .area(area.clone())
            .build();
        assert!(!cell.is_synced());
        cell.set(prefs("dark", 7));
        drop(cell);

        // a fresh cell inside the expiry window adopts the record
        let cell = StashCell::builder("prefs", prefs("light", 3))
            .storage(StorageKind::Cookie)
            .area(area.clone())
            .build();
        assert_eq!(cell.get(), prefs("dark", 7));
        drop(cell);

        // past max-age the record is gone and construction reseeds
        jar.advance_secs(2 * 86_400);
        let cell = StashCell::builder("prefs", prefs("light", 3))
            .storage(StorageKind::Cookie)
            .area(area)
            .build();
        assert_eq!(cell.get(), prefs("light", 3));
    }

    #[test]
    fn test_cookie_cell_with_nonpositive_expiry_stores_nothing() {
        let jar = Rc::new(CookieJar::new());
        let area = Rc::new(MemoryCookieArea::new(jar, 0.0));

        let cell = StashCell::builder("counter", 1i64)
            .storage(StorageKind::Cookie)
            .area(area.clone())
            .build();
        cell.set(5);

        assert_eq!(cell.get(), 5);
        assert_eq!(area.read("counter"), None);
    }

    #[test]
    fn test_counter_lifecycle() {
        let inner: Rc<MemoryArea> = Rc::default();
        let writes = Rc::new(Cell::new(0));
        let area = Rc::new(CountingArea {
            inner: inner.clone(),
            writes: writes.clone(),
        });

        // no prior record: construction seeds one
        let cell = StashCell::builder("counter", 0i64).area(area).build();
        assert_eq!(cell.key(), "counter");
        assert_eq!(inner.read("counter").as_deref(), Some("0"));

        cell.set(5);
        assert_eq!(cell.get(), 5);
        assert_eq!(inner.read("counter").as_deref(), Some("5"));

        // another tab moves the counter; applied without an answering write
        let before = writes.get();
        inner.emit_foreign_change("counter", Some("10"));
        assert_eq!(cell.get(), 10);
        assert_eq!(writes.get(), before);

        cell.reset();
        assert_eq!(cell.get(), 0);
        assert_eq!(inner.read("counter").as_deref(), Some("0"));
    }

    #[test]
    fn test_ambient_cells_share_by_kind() {
        let a = StashCell::new("ambient-counter", 0i64);
        a.set(3);

        let b = StashCell::new("ambient-counter", 0i64);
        assert_eq!(b.get(), 3);
    }

    proptest! {
        #[test]
        fn prop_set_get_round_trip(value in any::<i64>()) {
            let area: Rc<MemoryArea> = Rc::default();
            let cell = StashCell::builder("n", 0i64).area(area.clone()).build();

            cell.set(value);
            prop_assert_eq!(cell.get(), value);
            prop_assert_eq!(area.read("n"), Some(value.to_string()));
        }
    }
}
