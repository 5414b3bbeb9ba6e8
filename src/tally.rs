// src/tally.rs
use serde::Serialize;

use crate::models::Vote;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// One count per option, in option order.
    pub counts: Vec<u64>,
    pub total: u64,
}

/// Counts votes per option. Recomputed on every call; nothing is cached.
pub fn tally(options_len: usize, votes: &[Vote]) -> Tally {
    let mut counts = vec![0u64; options_len];
    let mut total = 0;
    for vote in votes {
        match counts.get_mut(vote.option_index) {
            Some(count) => {
                *count += 1;
                total += 1;
            }
            None => tracing::warn!(
                poll_id = %vote.poll_id,
                option_index = vote.option_index,
                options_len,
                "skipping vote outside option range"
            ),
        }
    }
    Tally { counts, total }
}
