//! Ordered scripting lists

use serde::{Deserialize, Serialize};

use super::ScriptError;
use super::value::AeteValue;

/// Ordered sequence of values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionList {
    items: Vec<AeteValue>,
}

impl ActionList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a value. On allocation failure the list is left unchanged
    pub fn push(&mut self, value: AeteValue) -> Result<(), ScriptError> {
        self.items
            .try_reserve(1)
            .map_err(|_| ScriptError::OutOfMemory)?;
        self.items.push(value);
        Ok(())
    }

    /// Value at an index
    pub fn get(&self, index: u32) -> Result<&AeteValue, ScriptError> {
        self.items
            .get(index as usize)
            .ok_or(ScriptError::BadIndex(index))
    }

    /// Type tag at an index
    pub fn type_of(&self, index: u32) -> Result<u32, ScriptError> {
        self.get(index).map(AeteValue::type_tag)
    }

    /// Items in order
    pub fn iter(&self) -> impl Iterator<Item = &AeteValue> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get_integer() {
        let mut list = ActionList::new();
        list.push(AeteValue::integer(42)).unwrap();
        assert_eq!(list.get(0).and_then(AeteValue::as_integer), Ok(42));
        assert_eq!(list.get(1), Err(ScriptError::BadIndex(1)));
    }

    #[test]
    fn test_nested_list_is_a_copy() {
        let mut inner = ActionList::new();
        inner.push(AeteValue::integer(1)).unwrap();
        let mut outer = ActionList::new();
        outer.push(AeteValue::list(inner.clone())).unwrap();
        inner.push(AeteValue::integer(2)).unwrap();
        drop(inner);
        assert_eq!(outer.get(0).and_then(AeteValue::as_list).map(ActionList::len), Ok(1));
    }
}
