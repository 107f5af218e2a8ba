//! Winner selection
//!
//! Uniform sampling without replacement over entry positions. Drawing
//! positions rather than ids keeps the draw well defined even if the entry
//! list ever carries duplicates: each occurrence stays equally likely.

use rand::Rng;
use rand::seq::index;

/// Draw `min(winner_count, entry_count)` distinct positions uniformly at
/// random. An empty entry list yields an empty draw.
pub fn draw_positions<R: Rng + ?Sized>(
    rng: &mut R,
    entry_count: usize,
    winner_count: usize,
) -> Vec<usize> {
    let take = winner_count.min(entry_count);
    if take == 0 {
        return Vec::new();
    }
    index::sample(rng, entry_count, take).into_vec()
}

/// Map a position draw over the entry list to winner ids.
pub fn select_winners<R: Rng + ?Sized>(
    rng: &mut R,
    entries: &[u64],
    winner_count: usize,
) -> Vec<u64> {
    draw_positions(rng, entries.len(), winner_count)
        .into_iter()
        .map(|position| entries[position])
        .collect()
}
