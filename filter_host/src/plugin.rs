//! Plugin initialization and interface
use std::path::PathBuf;

use filter_abi::FilterEntry;
use libloading::{Library, Symbol};

use crate::error::HostError;

/// Struct contatining plugin library
pub struct Plugin {
    plugin: Library,
}

/// Struct to hold the entry point of one filter in the library
pub struct PluginInterface<'a> {
    /// Exported name the entry was resolved from
    pub name: String,
    /// Filter entry point, called once per selector
    ///
    /// # Safety
    ///
    /// The function pointer is only valid while the library is loaded,
    /// copy it out only into hosts that do not outlive the `Plugin`
    pub entry_fn: Symbol<'a, FilterEntry>,
}

impl PluginInterface<'_> {
    /// Entry point as a plain function pointer for `FilterHost`
    pub fn entry(&self) -> FilterEntry {
        *self.entry_fn
    }
}

impl Plugin {
    /// Find and load a dynamic library
    ///
    /// `plugin_file` should point to existing dynamic library
    ///
    /// Safety: loading runs the library's initializers, the library is
    /// expected not to complete any harmful operations on load
    pub fn new(plugin_file: PathBuf) -> Result<Self, HostError> {
        let plugin = unsafe { Library::new(&plugin_file) }
            .map_err(|e| HostError::PluginLoad(format!("{}: {e}", plugin_file.display())))?;
        Ok(Plugin { plugin })
    }

    /// Gets the entry point exported as `name`
    ///
    /// Safety: the symbol is expected to have the filter entry signature,
    /// nothing in the library can verify it
    pub fn interface(&self, name: &str) -> Result<PluginInterface<'_>, HostError> {
        let entry_fn = unsafe { self.plugin.get::<FilterEntry>(name) }
            .map_err(|e| HostError::PluginLoad(format!("entry point '{name}': {e}")))?;
        Ok(PluginInterface {
            name: name.to_owned(),
            entry_fn,
        })
    }
}
