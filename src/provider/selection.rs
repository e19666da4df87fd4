use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::config::SelectionMode;

/// Chooses which of a provider's responses to return.
pub trait ResponsePicker: Send + Sync {
    /// Returns an index in `[0, len)`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

#[derive(Debug, Default)]
pub struct RandomPicker;

impl ResponsePicker for RandomPicker {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Cycles through responses in order, shared across all providers.
#[derive(Debug, Default)]
pub struct RoundRobinPicker {
    next: AtomicUsize,
}

impl ResponsePicker for RoundRobinPicker {
    fn pick(&self, len: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % len
    }
}

pub fn picker_for(mode: SelectionMode) -> Box<dyn ResponsePicker> {
    match mode {
        SelectionMode::Random => Box::new(RandomPicker),
        SelectionMode::RoundRobin => Box::new(RoundRobinPicker::default()),
    }
}
