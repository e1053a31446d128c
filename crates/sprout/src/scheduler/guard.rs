use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot reentrancy guard.
///
/// [`try_enter`](Self::try_enter) succeeds for exactly one caller until the
/// returned ticket is dropped.
#[derive(Debug, Default)]
pub struct CycleGuard {
    busy: AtomicBool,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<CycleTicket<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleTicket { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one cycle.
#[derive(Debug)]
pub struct CycleTicket<'a> {
    guard: &'a CycleGuard,
}

impl Drop for CycleTicket<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}
