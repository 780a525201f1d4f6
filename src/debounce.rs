/// Whether a key press at `now` may trigger playback, given the last accepted
/// trigger at `last` and the minimum gap `delay` (all in seconds).
///
/// The comparison is strict: an event exactly `delay` after the last trigger is
/// still suppressed, and with `delay == 0` two events at the same instant only
/// play once.
pub fn allow(now: f64, last: f64, delay: f64) -> bool {
    now - last > delay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_exclusive() {
        assert!(!allow(10.3, 10.0, 0.5));
        assert!(!allow(10.5, 10.0, 0.5));
        assert!(allow(10.6, 10.0, 0.5));
    }

    #[test]
    fn test_zero_delay() {
        assert!(allow(1.0, 0.999, 0.0));
        assert!(!allow(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_first_event_after_startup() {
        // last_played starts at the epoch
        assert!(allow(1_700_000_000.0, 0.0, 0.3));
    }

    #[test]
    fn test_clock_going_backwards_is_suppressed() {
        assert!(!allow(5.0, 6.0, 0.0));
    }
}
