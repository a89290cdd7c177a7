use jubilee_domain::Entity;
use std::sync::Mutex;

/// Useful functions for creating inmemory repositories

pub fn insert<T: Clone>(val: &T, collection: &Mutex<Vec<T>>) {
    let mut collection = collection.lock().unwrap();
    collection.push(val.clone());
}

pub fn save<K: PartialEq, T: Clone + Entity<K>>(val: &T, collection: &Mutex<Vec<T>>) {
    let mut collection = collection.lock().unwrap();
    for stored in collection.iter_mut() {
        if stored.id() == val.id() {
            *stored = val.clone();
        }
    }
}

pub fn find<K: PartialEq, T: Clone + Entity<K>>(val_id: &K, collection: &Mutex<Vec<T>>) -> Option<T> {
    let collection = collection.lock().unwrap();
    collection.iter().find(|stored| stored.id() == *val_id).cloned()
}

pub fn find_by<T: Clone, F: FnMut(&T) -> bool>(
    collection: &Mutex<Vec<T>>,
    mut compare: F,
) -> Vec<T> {
    let collection = collection.lock().unwrap();
    let mut items = Vec::new();
    for item in collection.iter() {
        if compare(item) {
            items.push(item.clone());
        }
    }
    items
}

pub fn delete<K: PartialEq, T: Clone + Entity<K>>(val_id: &K, collection: &Mutex<Vec<T>>) -> Option<T> {
    let mut collection = collection.lock().unwrap();
    for i in 0..collection.len() {
        if collection[i].id() == *val_id {
            return Some(collection.remove(i));
        }
    }
    None
}

/// Applies `update` to the record with the given id and returns the updated
/// clone.
pub fn update_one<K: PartialEq, T: Clone + Entity<K>, U: FnOnce(&mut T)>(
    val_id: &K,
    collection: &Mutex<Vec<T>>,
    update: U,
) -> Option<T> {
    let mut collection = collection.lock().unwrap();
    let stored = collection.iter_mut().find(|stored| stored.id() == *val_id)?;
    update(stored);
    Some(stored.clone())
}
