use std::sync::atomic::{AtomicU32, Ordering};

use uidmap_types::{Identifier, ID_MASK, MIN_ID};

/// Deterministic stream of candidate identifiers.
///
/// Each draw advances a shared counter and folds it into the 16-bit id space;
/// values that land on reserved ids are thrown away and the counter advances
/// again. New ids therefore spread pseudo-sequentially through the range
/// instead of refilling the lowest free slot.
#[derive(Debug)]
pub struct CandidateGenerator {
    counter: AtomicU32,
}

impl CandidateGenerator {
    /// Generator whose first candidate is `MIN_ID + 1`.
    pub fn new() -> Self {
        Self::starting_at(MIN_ID as u32)
    }

    /// Generator whose first candidate is derived from `seed + 1`.
    pub fn starting_at(seed: u32) -> Self {
        Self {
            counter: AtomicU32::new(seed),
        }
    }

    /// Draw the next legal candidate.
    ///
    /// Never blocks; at most 1025 reserved values are skipped per call.
    pub fn next_candidate(&self) -> Identifier {
        loop {
            let raw = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1) & ID_MASK;
            if let Ok(id) = Identifier::try_from(raw) {
                return id;
            }
        }
    }
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new()
    }
}
