//! Memory suites exposed to plug-ins: handles, buffers and host OS blocks

mod block;
pub mod buffer;
pub mod handle;
pub mod native;

use std::cell::RefCell;

pub use buffer::BufferTable;
pub use handle::{ForeignHandle, HandleTable};

/// Handle and buffer tables shared by every run of a session.
///
/// Hosts hold them through `Rc` so repeat runs see the same suites; `reset_all`
/// is the teardown sweep and may be called any number of times.
#[derive(Debug)]
pub struct MemorySuites {
    /// Handle suite state
    pub handles: RefCell<HandleTable>,
    /// Buffer suite state
    pub buffers: RefCell<BufferTable>,
}

impl MemorySuites {
    /// Fresh suites, buffer space capped at `buffer_ceiling` bytes
    pub fn new(buffer_ceiling: u64) -> Self {
        MemorySuites {
            handles: RefCell::new(HandleTable::new()),
            buffers: RefCell::new(BufferTable::new(buffer_ceiling)),
        }
    }

    /// Free everything still outstanding, returning the number of blocks released
    pub fn reset_all(&self) -> usize {
        let handles = self.handles.borrow_mut().free_all();
        let buffers = self.buffers.borrow_mut().free_all();
        handles + buffers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_all_is_idempotent() {
        let suites = MemorySuites::new(1 << 20);
        suites.handles.borrow_mut().allocate(10);
        suites.buffers.borrow_mut().allocate(10);
        assert_eq!(suites.reset_all(), 2);
        assert_eq!(suites.reset_all(), 0);
    }
}
