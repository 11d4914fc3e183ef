//! Ring placement
//!
//! Combatants stand on a 1-D ring of `event.size` cells. For display the ring
//! is projected onto a horizontal strip (`left`, percent) and sprites that
//! land in the same strip bin fan out above and below a center line (`top`).

use ahash::AHashMap;

use crate::entity::combatant::Combatant;

/// Leftmost display coordinate (percent)
pub const LEFT_MIN: i32 = 5;

/// Rightmost display coordinate (percent)
pub const LEFT_MAX: i32 = 95;

/// Width of the bins used to detect overlapping sprites
pub const BIN_WIDTH: i32 = 5;

/// Vertical center line (percent)
pub const CENTER_TOP: i32 = 50;

/// Vertical distance between stacked sprites in one bin
pub const STACK_SPACING: i32 = 12;

/// Move along the ring, wrapping at both ends
pub fn step_position(position: i32, step: i32, size: i32) -> i32 {
    (position + step).rem_euclid(size)
}

/// Shortest distance between two ring cells
pub fn ring_distance(a: i32, b: i32, size: i32) -> i32 {
    let d = (a - b).rem_euclid(size);
    d.min(size - d)
}

/// Horizontal display coordinate for a ring position
pub fn ring_left(position: i32, size: i32) -> i32 {
    if size <= 0 {
        return LEFT_MIN;
    }
    let percent = (position as f64 / size as f64 * 100.0).floor() as i32;
    percent.clamp(LEFT_MIN, LEFT_MAX)
}

/// Vertical display coordinate for the `rank`-th sprite in a bin
///
/// Rank 0 sits on the center line, then alternately above and below:
/// 50, 38, 62, 26, 74, ...
pub fn stacked_top(rank: usize) -> i32 {
    if rank == 0 {
        return CENTER_TOP;
    }
    let ring = ((rank + 1) / 2) as i32;
    let offset = ring * STACK_SPACING;
    let top = if rank % 2 == 1 {
        CENTER_TOP - offset
    } else {
        CENTER_TOP + offset
    };
    top.clamp(LEFT_MIN, LEFT_MAX)
}

fn bin_of(left: i32) -> i32 {
    left / BIN_WIDTH
}

/// Recompute `left`/`top` for every living, positioned combatant
///
/// Dead combatants keep their last coordinates.
pub fn assign_layout(roster: &mut [Combatant], size: i32) {
    let mut per_bin: AHashMap<i32, usize> = AHashMap::new();

    for combatant in roster.iter_mut().filter(|c| !c.is_dead()) {
        let Some(position) = combatant.position else {
            continue;
        };
        let left = ring_left(position, size);
        let rank = per_bin.entry(bin_of(left)).or_insert(0);
        combatant.left = left;
        combatant.top = stacked_top(*rank);
        *rank += 1;
    }
}
