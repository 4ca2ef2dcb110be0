use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::search::context::SearchContext;
use crate::search::flag::AtomicSearchFlag;
use crate::search::tt::TranspositionTable;

/// The process-wide state a search worker shares with the UCI driver: the
/// transposition table, killer/history heuristics, and the cancellation
/// flag. The driver owns an `Arc<SearchState>` and hands a clone to each
/// worker it spawns; the worker is the only thread touching `tt`/`ctx` while
/// it runs, and the driver only touches them between searches (enforced by
/// convention, not by the type system — see the module doc on tearing).
///
/// `tt` and `ctx` live behind `UnsafeCell` rather than a `Mutex`: the spec's
/// concurrency model is a single worker with lockless, tearing-tolerant
/// access (the TT's key comparison on probe makes a torn read harmless), so
/// a lock would add overhead the design explicitly forgoes.
pub struct SearchState {
    tt: UnsafeCell<TranspositionTable>,
    ctx: UnsafeCell<SearchContext>,
    pub flag: AtomicSearchFlag,
}

// SAFETY: callers uphold the single-writer-at-a-time discipline described
// above; see `tt_mut`/`ctx_mut` for the exact contract.
unsafe impl Sync for SearchState {}
unsafe impl Send for SearchState {}

impl SearchState {
    pub fn new(hash_mb: usize) -> Arc<Self> {
        Arc::new(Self {
            tt: UnsafeCell::new(TranspositionTable::new(hash_mb)),
            ctx: UnsafeCell::new(SearchContext::new()),
            flag: AtomicSearchFlag::default(),
        })
    }

    /// # Safety
    /// Caller must not call this (or `ctx_mut`) concurrently from more than
    /// one thread. The driver only calls it while no worker is alive; the
    /// worker only calls it from within its own thread.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn tt_mut(&self) -> &mut TranspositionTable {
        unsafe { &mut *self.tt.get() }
    }

    /// # Safety
    /// See [`Self::tt_mut`].
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn ctx_mut(&self) -> &mut SearchContext {
        unsafe { &mut *self.ctx.get() }
    }

    /// Resets killers/history and bumps the TT's age. Must only be called
    /// with no worker running (`ucinewgame`, and once per `go` before the
    /// worker is spawned).
    pub fn new_search(&self) {
        unsafe {
            self.tt_mut().new_search();
            self.ctx_mut().decay();
        }
    }

    /// Clears the TT entirely (`ucinewgame`). No worker may be running.
    pub fn clear_tt(&self) {
        unsafe { self.tt_mut().clear() }
    }

    /// Reallocates the TT to a new megabyte budget (`setoption name Hash`).
    /// No worker may be running.
    pub fn resize_tt(&self, hash_mb: usize) {
        unsafe { *self.tt_mut() = TranspositionTable::new(hash_mb) }
    }

    pub fn hashfull(&self) -> u32 {
        unsafe { self.tt_mut().hashfull() }
    }
}
