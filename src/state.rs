//! Process-wide parsing state.
//!
//! A single writer (the parser task) advances the state between blocks;
//! readers take point-in-time snapshots. The handle is cheap to clone;
//! there is no global singleton.

use std::sync::{Arc, RwLock};

/// Ledger lifecycle tag, advanced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Starting,
    CatchingUp,
    Following,
}

#[derive(Debug, Clone)]
struct Inner {
    current_block_index: u32,
    current_block_time: u32,
    current_backend_height: u32,
    parsing_mempool: bool,
    ledger_state: LedgerState,
}

/// Cloneable handle to the current parsing state.
#[derive(Debug, Clone)]
pub struct CurrentState {
    inner: Arc<RwLock<Inner>>,
}

/// Read-only snapshot of the state at one instant.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot {
    pub current_block_index: u32,
    pub current_block_time: u32,
    pub current_backend_height: u32,
    pub parsing_mempool: bool,
    pub ledger_state: LedgerState,
}

impl CurrentState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                current_block_index: 0,
                current_block_time: 0,
                current_backend_height: 0,
                parsing_mempool: false,
                ledger_state: LedgerState::Starting,
            })),
        }
    }

    pub fn current_block_index(&self) -> u32 {
        self.read().current_block_index
    }

    pub fn current_block_time(&self) -> u32 {
        self.read().current_block_time
    }

    pub fn current_backend_height(&self) -> u32 {
        self.read().current_backend_height
    }

    pub fn parsing_mempool(&self) -> bool {
        self.read().parsing_mempool
    }

    pub fn ledger_state(&self) -> LedgerState {
        self.read().ledger_state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.read();
        StateSnapshot {
            current_block_index: inner.current_block_index,
            current_block_time: inner.current_block_time,
            current_backend_height: inner.current_backend_height,
            parsing_mempool: inner.parsing_mempool,
            ledger_state: inner.ledger_state,
        }
    }

    /// Advance to a new block. Writer-side only.
    pub fn set_current_block(&self, block_index: u32, block_time: u32) {
        let mut inner = self.write();
        inner.current_block_index = block_index;
        inner.current_block_time = block_time;
    }

    pub fn set_current_backend_height(&self, height: u32) {
        self.write().current_backend_height = height;
    }

    pub fn set_parsing_mempool(&self, parsing: bool) {
        self.write().parsing_mempool = parsing;
    }

    pub fn set_ledger_state(&self, ledger_state: LedgerState) {
        self.write().ledger_state = ledger_state;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        // A poisoned lock means a writer panicked mid-block; the state is a
        // handful of Copy fields, so the value itself is still coherent.
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CurrentState {
    fn default() -> Self {
        Self::new()
    }
}
