//! Reference chains naming objects in the host's object model

use filter_abi::terms::form_id;
use serde::{Deserialize, Serialize};

use super::ScriptError;

/// How a reference item selects its object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReferenceForm {
    /// The class itself
    Class,
    /// By name
    Name(String),
    /// By position
    Index(u32),
    /// By unique id
    Identifier(u32),
    /// Relative to the current object
    Offset(i32),
    /// By enumerated value
    Enumerated {
        /// Enumeration type
        type_id: u32,
        /// Enumeration value
        value: u32,
    },
    /// By property key
    Property(u32),
}

impl ReferenceForm {
    /// Four-char code of the form
    pub fn form_id(&self) -> u32 {
        match self {
            ReferenceForm::Class => form_id::CLASS,
            ReferenceForm::Name(_) => form_id::NAME,
            ReferenceForm::Index(_) => form_id::INDEX,
            ReferenceForm::Identifier(_) => form_id::IDENTIFIER,
            ReferenceForm::Offset(_) => form_id::OFFSET,
            ReferenceForm::Enumerated { .. } => form_id::ENUMERATED,
            ReferenceForm::Property(_) => form_id::PROPERTY,
        }
    }
}

/// One link of a reference chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceItem {
    /// Class of the selected object
    pub desired_class: u32,
    /// Selection form and payload
    pub form: ReferenceForm,
}

/// Chain of reference items, innermost first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionReference {
    items: Vec<ReferenceItem>,
}

impl ActionReference {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. On allocation failure the chain is left unchanged
    pub fn push(&mut self, desired_class: u32, form: ReferenceForm) -> Result<(), ScriptError> {
        self.items
            .try_reserve(1)
            .map_err(|_| ScriptError::OutOfMemory)?;
        self.items.push(ReferenceItem {
            desired_class,
            form,
        });
        Ok(())
    }

    /// The item the getters report on
    pub fn head(&self) -> Result<&ReferenceItem, ScriptError> {
        self.items.first().ok_or(ScriptError::BadIndex(0))
    }

    /// The chain without its head, `None` when nothing contains the head
    pub fn container(&self) -> Option<ActionReference> {
        if self.items.len() < 2 {
            return None;
        }
        Some(ActionReference {
            items: self.items[1..].to_vec(),
        })
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
