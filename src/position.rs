//! Loop position arithmetic.
//!
//! A [`Position`] is a point in the loop's repeating timeline. The whole `u16`
//! range is one pass of the loop, so every comparison has to account for the
//! wrap from `u16::MAX` back to `0`.

/// A point within one pass of the loop.
pub type Position = u16;

/// The last position before the loop wraps.
///
/// Starting playback from here makes events at position `0` count as passed
/// on the first update.
pub const LOOP_END: Position = Position::MAX;

/// Returns whether `target` was crossed while moving from `before` to `after`.
///
/// True iff `target` lies in the cyclic interval `(before, after]`. When
/// `after <= before` the interval wraps, so `before == after` covers the
/// whole loop.
pub fn passed(target: Position, before: Position, after: Position) -> bool {
    if before < after {
        target > before && target <= after
    } else {
        target > before || target <= after
    }
}

/// Map a clock count onto the position space of a loop `length_clocks` long.
///
/// Returns `0` for a zero-length loop.
pub fn position_at(clock_count: u64, length_clocks: u64) -> Position {
    if length_clocks == 0 {
        return 0;
    }
    let phase = clock_count % length_clocks;
    ((phase << 16) / length_clocks) as Position
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_without_wrap() {
        assert!(passed(10, 5, 10));
        assert!(passed(6, 5, 10));
        assert!(!passed(5, 5, 10));
        assert!(!passed(11, 5, 10));
    }

    #[test]
    fn test_passed_across_wrap() {
        assert!(passed(65535, 65530, 4));
        assert!(passed(0, 65530, 4));
        assert!(passed(4, 65530, 4));
        assert!(!passed(5, 65530, 4));
        assert!(!passed(65530, 65530, 4));
        assert!(!passed(1000, 65530, 4));
    }

    #[test]
    fn test_equal_bounds_cover_full_loop() {
        for target in [0, 1, 99, 100, 101, 65535] {
            assert!(passed(target, 100, 100), "target {}", target);
        }
    }

    #[test]
    fn test_loop_end_includes_zero() {
        assert!(passed(0, LOOP_END, 0));
        assert!(passed(0, LOOP_END, 200));
        assert!(!passed(201, LOOP_END, 200));
    }

    #[test]
    fn test_position_at_scales_to_full_range() {
        // 1 bar at 24 ppqn
        assert_eq!(position_at(0, 96), 0);
        assert_eq!(position_at(48, 96), 32768);
        assert_eq!(position_at(95, 96), (95u64 * 65536 / 96) as u16);
        assert_eq!(position_at(96, 96), 0);
        assert_eq!(position_at(144, 96), 32768);
    }

    #[test]
    fn test_position_at_zero_length() {
        assert_eq!(position_at(1234, 0), 0);
    }

    #[test]
    fn test_position_at_never_reaches_loop_end() {
        for length in [1u64, 96, 192, 384, 65535] {
            assert!(position_at(length - 1, length) < LOOP_END);
        }
    }
}
