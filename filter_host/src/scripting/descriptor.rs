//! Keyed scripting records

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ScriptError;
use super::value::AeteValue;

/// Insertion-ordered map from four-char keys to values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    items: IndexMap<u32, AeteValue>,
}

impl ActionDescriptor {
    /// Empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No keys
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Store a value, replacing any previous value of the key in place.
    /// On allocation failure the descriptor is left unchanged.
    pub fn put(&mut self, key: u32, value: AeteValue) -> Result<(), ScriptError> {
        if !self.items.contains_key(&key) {
            self.items
                .try_reserve(1)
                .map_err(|_| ScriptError::OutOfMemory)?;
        }
        self.items.insert(key, value);
        Ok(())
    }

    /// Value of a key
    pub fn get(&self, key: u32) -> Result<&AeteValue, ScriptError> {
        self.items.get(&key).ok_or(ScriptError::MissingKey(key))
    }

    /// Type tag of a key
    pub fn type_of(&self, key: u32) -> Result<u32, ScriptError> {
        self.get(key).map(AeteValue::type_tag)
    }

    /// Key at an insertion position
    pub fn key_at(&self, index: u32) -> Result<u32, ScriptError> {
        self.items
            .get_index(index as usize)
            .map(|(key, _)| *key)
            .ok_or(ScriptError::BadIndex(index))
    }

    /// Key and value at an insertion position
    pub fn entry_at(&self, index: usize) -> Option<(u32, &AeteValue)> {
        self.items.get_index(index).map(|(key, value)| (*key, value))
    }

    /// Whether the key is present
    pub fn has_key(&self, key: u32) -> bool {
        self.items.contains_key(&key)
    }

    /// Whether every key is present
    pub fn has_keys(&self, keys: &[u32]) -> bool {
        keys.iter().all(|key| self.has_key(*key))
    }

    /// Remove a key, keeping the order of the rest
    pub fn erase(&mut self, key: u32) -> Result<(), ScriptError> {
        self.items
            .shift_remove(&key)
            .map(|_| ())
            .ok_or(ScriptError::MissingKey(key))
    }

    /// Remove every key
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_abi::four_cc;
    use filter_abi::terms::type_id;

    #[test]
    fn test_keys_keep_insertion_order() {
        let mut desc = ActionDescriptor::new();
        desc.put(four_cc(b"Rds "), AeteValue::integer(4)).unwrap();
        desc.put(four_cc(b"Amnt"), AeteValue::float(0.5)).unwrap();
        desc.put(four_cc(b"Rds "), AeteValue::integer(9)).unwrap();
        assert_eq!(desc.key_at(0), Ok(four_cc(b"Rds ")));
        assert_eq!(desc.key_at(1), Ok(four_cc(b"Amnt")));
        assert_eq!(desc.get(four_cc(b"Rds ")).and_then(AeteValue::as_integer), Ok(9));
        assert_eq!(desc.key_at(2), Err(ScriptError::BadIndex(2)));
    }

    #[test]
    fn test_missing_key_and_erase() {
        let key = four_cc(b"Md  ");
        let mut desc = ActionDescriptor::new();
        assert_eq!(desc.get(key), Err(ScriptError::MissingKey(key)));
        desc.put(key, AeteValue::enumerated(1, 2)).unwrap();
        assert_eq!(desc.type_of(key), Ok(type_id::ENUMERATED));
        desc.erase(key).unwrap();
        assert!(!desc.has_key(key));
        assert_eq!(desc.erase(key), Err(ScriptError::MissingKey(key)));
    }

    #[test]
    fn test_has_keys() {
        let mut desc = ActionDescriptor::new();
        desc.put(1, AeteValue::boolean(true)).unwrap();
        desc.put(2, AeteValue::boolean(false)).unwrap();
        assert!(desc.has_keys(&[1, 2]));
        assert!(!desc.has_keys(&[1, 3]));
    }

    #[test]
    fn test_serde_keeps_order() {
        let mut desc = ActionDescriptor::new();
        desc.put(30, AeteValue::text("b")).unwrap();
        desc.put(10, AeteValue::text("a")).unwrap();
        let json = serde_json::to_string(&desc).unwrap();
        let back: ActionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec![30, 10]);
        assert_eq!(back, desc);
    }
}
