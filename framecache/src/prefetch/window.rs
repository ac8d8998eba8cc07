//! Prefetch window construction.
//!
//! Frames closest to the visible one are fetched first, alternating forward
//! and backward:
//!
//! ```text
//! radius 2, current 10:   10, 11, 9, 12, 8
//! radius 2, current 0:     0, 1, 2          (negative side clipped)
//! ```

use std::fmt;

/// How far around the current frame to prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSize {
    /// Up to `n` frames on each side of the current frame.
    Radius(u32),
    /// Every frame of the content.
    Unbounded,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::Radius(20)
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radius(n) => write!(f, "{}", n),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Indices to prefetch, in priority order.
///
/// Starts at `current` and alternates `+1, -1, +2, -2, ...` out to the
/// window radius. Indices outside `0..len` are dropped rather than replaced
/// with extra indices from the other side. Returns nothing when `current`
/// is out of range.
pub fn window_indices(current: usize, len: usize, size: WindowSize) -> Vec<usize> {
    if current >= len {
        return Vec::new();
    }

    let radius = match size {
        WindowSize::Radius(n) => n as usize,
        WindowSize::Unbounded => len,
    };

    let mut indices = Vec::with_capacity((2 * radius + 1).min(len));
    indices.push(current);
    for step in 1..=radius {
        let forward = current.checked_add(step).filter(|&i| i < len);
        let backward = current.checked_sub(step);
        if forward.is_none() && backward.is_none() {
            break;
        }
        indices.extend(forward);
        indices.extend(backward);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_window_alternates_outward() {
        assert_eq!(
            window_indices(10, 20, WindowSize::Radius(2)),
            vec![10, 11, 9, 12, 8]
        );
    }

    #[test]
    fn test_window_clipped_at_start() {
        assert_eq!(window_indices(0, 20, WindowSize::Radius(2)), vec![0, 1, 2]);
        assert_eq!(window_indices(1, 20, WindowSize::Radius(2)), vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_window_clipped_at_end() {
        assert_eq!(
            window_indices(19, 20, WindowSize::Radius(2)),
            vec![19, 18, 17]
        );
    }

    #[test]
    fn test_window_radius_zero() {
        assert_eq!(window_indices(5, 20, WindowSize::Radius(0)), vec![5]);
    }

    #[test]
    fn test_unbounded_covers_everything() {
        assert_eq!(
            window_indices(2, 5, WindowSize::Unbounded),
            vec![2, 3, 1, 4, 0]
        );
    }

    #[test]
    fn test_out_of_range_current() {
        assert!(window_indices(5, 5, WindowSize::Radius(3)).is_empty());
        assert!(window_indices(0, 0, WindowSize::Unbounded).is_empty());
    }

    #[test]
    fn test_window_size_display() {
        assert_eq!(WindowSize::Radius(20).to_string(), "20");
        assert_eq!(WindowSize::Unbounded.to_string(), "unbounded");
    }

    proptest! {
        #[test]
        fn prop_window_starts_at_current(len in 1usize..500, radius in 0u32..100, seed in any::<usize>()) {
            let current = seed % len;
            let indices = window_indices(current, len, WindowSize::Radius(radius));
            prop_assert_eq!(indices[0], current);
        }

        #[test]
        fn prop_window_in_range_and_unique(len in 1usize..500, radius in 0u32..100, seed in any::<usize>()) {
            let current = seed % len;
            let indices = window_indices(current, len, WindowSize::Radius(radius));
            let unique: HashSet<_> = indices.iter().copied().collect();
            prop_assert_eq!(unique.len(), indices.len());
            prop_assert!(indices.iter().all(|&i| i < len));
        }

        #[test]
        fn prop_window_distance_never_decreases(len in 1usize..500, radius in 0u32..100, seed in any::<usize>()) {
            let current = seed % len;
            let indices = window_indices(current, len, WindowSize::Radius(radius));
            let distances: Vec<usize> = indices.iter().map(|&i| i.abs_diff(current)).collect();
            prop_assert!(distances.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(distances.iter().all(|&d| d <= radius as usize));
        }

        #[test]
        fn prop_window_contains_every_index_within_radius(len in 1usize..500, radius in 0u32..100, seed in any::<usize>()) {
            let current = seed % len;
            let indices: HashSet<_> = window_indices(current, len, WindowSize::Radius(radius)).into_iter().collect();
            let expected = (0..len).filter(|i| i.abs_diff(current) <= radius as usize).count();
            prop_assert_eq!(indices.len(), expected);
        }

        #[test]
        fn prop_unbounded_is_a_permutation(len in 1usize..300, seed in any::<usize>()) {
            let current = seed % len;
            let mut indices = window_indices(current, len, WindowSize::Unbounded);
            indices.sort_unstable();
            prop_assert_eq!(indices, (0..len).collect::<Vec<_>>());
        }
    }
}
