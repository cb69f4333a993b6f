//! Applying changes made by other tabs.
//!
//! A subscription forwards the medium's change notifications into the cell's
//! shared state. Two rules keep the tabs coherent:
//!
//! - a notification carrying the raw we already believe the medium holds is
//!   a no-op (our own write echoed back, or a repeat of an applied value)
//! - a notification with no value means the record was removed elsewhere;
//!   the cell falls back to its initial value in memory without writing it
//!   back, mirroring what a fresh load would see

use std::rc::Rc;

use crate::backend::{AreaChange, StorageArea, WatchGuard};
use crate::cell::Shared;

/// Register a watch on `shared`'s key. Returns `None` when the area has no
/// notification stream. The guard releases the subscription on drop; the
/// callback holds the state weakly so a leaked guard cannot keep it alive.
pub(crate) fn subscribe<T: Clone + 'static>(
    area: &Rc<dyn StorageArea>,
    shared: &Rc<Shared<T>>,
) -> Option<WatchGuard> {
    let weak = Rc::downgrade(shared);
    area.watch(
        shared.key(),
        Box::new(move |change| {
            if let Some(shared) = weak.upgrade() {
                apply_foreign(&shared, change);
            }
        }),
    )
}

/// Fold one foreign notification into the cell state.
pub(crate) fn apply_foreign<T: Clone>(shared: &Shared<T>, change: AreaChange) {
    if shared.matches_last_written(change.new_value.as_deref()) {
        log::debug!("ignoring echoed change for '{}'", change.key);
        return;
    }
    match change.new_value {
        Some(raw) => {
            let value = shared.parse_with_fallback(&raw);
            shared.install(value, Some(raw));
        }
        None => {
            log::debug!(
                "record for '{}' removed elsewhere, restoring initial value",
                change.key
            );
            shared.install(shared.initial_clone(), None);
        }
    }
}
