use std::sync::atomic::{AtomicU8, Ordering};

/// Process-wide signal between the UCI driver thread and the search worker.
///
/// The driver stores with `Release`, the worker polls with `Acquire`; together
/// they form the only happens-before edge between the two threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchFlag {
    Think = 0,
    Ponder = 1,
    PonderHit = 2,
    Exit = 3,
}

impl SearchFlag {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SearchFlag::Think,
            1 => SearchFlag::Ponder,
            2 => SearchFlag::PonderHit,
            _ => SearchFlag::Exit,
        }
    }
}

/// Atomic holder for [`SearchFlag`]. Default (and post-exit) state is `Exit`.
pub struct AtomicSearchFlag(AtomicU8);

impl Default for AtomicSearchFlag {
    fn default() -> Self {
        Self::new(SearchFlag::Exit)
    }
}

impl AtomicSearchFlag {
    pub fn new(initial: SearchFlag) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    #[inline]
    pub fn load(&self) -> SearchFlag {
        SearchFlag::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, flag: SearchFlag) {
        self.0.store(flag as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_exit(&self) -> bool {
        self.load() == SearchFlag::Exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_exit() {
        assert_eq!(AtomicSearchFlag::default().load(), SearchFlag::Exit);
    }

    #[test]
    fn store_then_load_round_trips() {
        let flag = AtomicSearchFlag::new(SearchFlag::Exit);
        flag.store(SearchFlag::Ponder);
        assert_eq!(flag.load(), SearchFlag::Ponder);
        flag.store(SearchFlag::PonderHit);
        assert_eq!(flag.load(), SearchFlag::PonderHit);
        flag.store(SearchFlag::Think);
        assert!(!flag.is_exit());
        flag.store(SearchFlag::Exit);
        assert!(flag.is_exit());
    }
}
