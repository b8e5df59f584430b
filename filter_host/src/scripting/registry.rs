//! Id tables for objects handed to plug-ins as opaque pointers

use std::collections::HashMap;

use super::ScriptError;

/// Objects keyed by small integer ids.
///
/// Ids start at 1 and grow monotonically; freeing the most recently issued
/// id hands it out again, so every live id stays below the counter.
#[derive(Debug)]
pub struct Registry<T> {
    items: HashMap<usize, T>,
    next: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            items: HashMap::new(),
            next: 1,
        }
    }
}

impl<T> Registry<T> {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object and return its id
    pub fn insert(&mut self, item: T) -> Result<usize, ScriptError> {
        self.items
            .try_reserve(1)
            .map_err(|_| ScriptError::OutOfMemory)?;
        let id = self.next;
        self.next += 1;
        self.items.insert(id, item);
        Ok(id)
    }

    /// Object behind an id
    pub fn get(&self, id: usize) -> Result<&T, ScriptError> {
        self.items.get(&id).ok_or(ScriptError::InvalidId)
    }

    /// Mutable object behind an id
    pub fn get_mut(&mut self, id: usize) -> Result<&mut T, ScriptError> {
        self.items.get_mut(&id).ok_or(ScriptError::InvalidId)
    }

    /// Remove and return an object
    pub fn remove(&mut self, id: usize) -> Result<T, ScriptError> {
        let item = self.items.remove(&id).ok_or(ScriptError::InvalidId)?;
        if id + 1 == self.next {
            self.next -= 1;
        }
        Ok(item)
    }

    /// Whether the id is live
    pub fn contains(&self, id: usize) -> bool {
        self.items.contains_key(&id)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No live objects
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every object and restart numbering
    pub fn clear(&mut self) {
        self.items.clear();
        self.next = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_grow() {
        let mut registry = Registry::new();
        assert_eq!(registry.insert("a"), Ok(1));
        assert_eq!(registry.insert("b"), Ok(2));
        assert_eq!(registry.get(2), Ok(&"b"));
    }

    #[test]
    fn test_freeing_last_id_reuses_it() {
        let mut registry = Registry::new();
        registry.insert(1).unwrap();
        let second = registry.insert(2).unwrap();
        registry.remove(second).unwrap();
        assert_eq!(registry.insert(3), Ok(second));
    }

    #[test]
    fn test_freeing_earlier_id_does_not_rewind() {
        let mut registry = Registry::new();
        let first = registry.insert(1).unwrap();
        registry.insert(2).unwrap();
        registry.remove(first).unwrap();
        assert_eq!(registry.insert(3), Ok(3));
    }

    #[test]
    fn test_double_free_is_reported() {
        let mut registry = Registry::new();
        let id = registry.insert(()).unwrap();
        registry.remove(id).unwrap();
        assert_eq!(registry.remove(id), Err(ScriptError::InvalidId));
        assert_eq!(registry.get(id), Err(ScriptError::InvalidId));
    }
}
