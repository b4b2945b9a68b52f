use booking_notifier_domain::{DeadLetterRecord, LedgerEntry, NotificationJob};
use std::sync::{Mutex, MutexGuard};

/// Useful functions for creating inmemory repositories

/// A panic while holding the lock cannot leave a `Vec` half written, so a
/// poisoned lock is still safe to use.
pub fn lock<T>(collection: &Mutex<T>) -> MutexGuard<'_, T> {
    collection
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn insert<T: Clone>(val: &T, collection: &Mutex<Vec<T>>) {
    let mut collection = lock(collection);
    collection.push(val.clone());
}

pub fn find_by<T: Clone, F: FnMut(&T) -> bool>(
    collection: &Mutex<Vec<T>>,
    mut compare: F,
) -> Vec<T> {
    let collection = lock(collection);
    collection
        .iter()
        .filter(|item| compare(*item))
        .cloned()
        .collect()
}

/// Applies `update` to every matching item and returns the updated items
pub fn update_many<T: Clone, F: Fn(&T) -> bool, U: Fn(&mut T)>(
    collection: &Mutex<Vec<T>>,
    compare: F,
    update: U,
) -> Vec<T> {
    let mut collection = lock(collection);
    let mut updated = Vec::new();
    for item in collection.iter_mut() {
        if compare(item) {
            update(item);
            updated.push(item.clone());
        }
    }
    updated
}

pub fn find_and_delete_by<T: Clone, F: Fn(&T) -> bool>(
    collection: &mut Vec<T>,
    compare: F,
) -> Vec<T> {
    let mut deleted_items = Vec::new();
    let mut i = 0;
    while i < collection.len() {
        if compare(&collection[i]) {
            deleted_items.push(collection.remove(i));
        } else {
            i += 1;
        }
    }
    deleted_items
}

/// The notification tables shared by all the inmemory repositories.
///
/// Operations spanning several tables lock them in declaration order:
/// jobs, ledger and then dead letters.
#[derive(Default)]
pub struct InMemoryNotificationTables {
    pub jobs: Mutex<Vec<NotificationJob>>,
    pub ledger: Mutex<Vec<LedgerEntry>>,
    pub dead_letters: Mutex<Vec<DeadLetterRecord>>,
}

impl InMemoryNotificationTables {
    pub fn new() -> Self {
        Self::default()
    }
}
