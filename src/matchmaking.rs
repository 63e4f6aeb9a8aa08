use std::time::Duration;

use instant::Instant;
use itertools::Itertools;
use log::info;

use crate::player::PlayerId;


// The allowed rating gap starts here and doubles every WIDEN_EVERY waited,
// so any two waiting players eventually pair up.
const BASE_RATING_GAP: u32 = 200;
const MAX_RATING_GAP: u32 = 3200;
const WIDEN_EVERY: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub rating: u32,
    pub joined_at: Instant,
}

fn allowed_gap(waited: Duration) -> u32 {
    let doublings = (waited.as_secs() / WIDEN_EVERY.as_secs()).min(8) as u32;
    BASE_RATING_GAP.saturating_mul(1 << doublings).min(MAX_RATING_GAP)
}

// Rating-keyed waiting queue. Single-writer: only the server loop touches it,
// from message handling and from the matchmaking tick.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: Vec<QueueEntry>,
}

impl MatchmakingQueue {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    // Joining twice is a no-op apart from a rating refresh; the original wait
    // position is kept.
    pub fn join(&mut self, player_id: PlayerId, rating: u32, now: Instant) {
        match self.entries.iter_mut().find(|e| e.player_id == player_id) {
            Some(entry) => entry.rating = rating,
            None => {
                info!("Player {player_id} queued with rating {rating}");
                self.entries.push(QueueEntry { player_id, rating, joined_at: now });
            }
        }
    }

    pub fn leave(&mut self, player_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.player_id != player_id);
        before != self.entries.len()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.iter().any(|e| e.player_id == player_id)
    }

    // 1-based wait position, by join order.
    pub fn position(&self, player_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.player_id == player_id).map(|idx| idx + 1)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.entries.iter().map(|e| &e.player_id)
    }

    // Picks the closest-rated waiting pair whose gap fits the wait-widened
    // threshold and removes both from the queue.
    pub fn pair(&mut self, now: Instant) -> Option<(QueueEntry, QueueEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let by_rating = self
            .entries
            .iter()
            .enumerate()
            .sorted_by_key(|(_, e)| e.rating)
            .collect_vec();
        let best = by_rating
            .windows(2)
            .map(|pair| {
                let (i, a) = pair[0];
                let (j, b) = pair[1];
                (b.rating - a.rating, i, j)
            })
            .min_by_key(|&(gap, ..)| gap)?;
        let (gap, i, j) = best;
        let waited = [&self.entries[i], &self.entries[j]]
            .iter()
            .map(|e| now.saturating_duration_since(e.joined_at))
            .max()
            .unwrap_or(Duration::ZERO);
        if gap > allowed_gap(waited) {
            return None;
        }
        // Remove the higher index first to keep the lower one valid.
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let second = self.entries.remove(hi);
        let first = self.entries.remove(lo);
        info!(
            "Matched {} ({}) vs {} ({})",
            first.player_id, first.rating, second.player_id, second.rating
        );
        Some((first, second))
    }
}
