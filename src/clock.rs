use std::time::Duration;

use enum_map::{enum_map, EnumMap};
use serde::{Deserialize, Serialize};

use crate::force::Force;


#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TimeControl {
    // Whole seconds; the wire protocol reports clocks at one-second granularity.
    pub starting_time: Duration,
    // Added to the mover's clock when a turn commits.
    pub increment: Duration,
}

impl Default for TimeControl {
    fn default() -> Self {
        TimeControl { starting_time: Duration::from_secs(600), increment: Duration::ZERO }
    }
}

// Wire form of the clocks: `{"white": secs, "black": secs}`.
pub type WireTimers = EnumMap<Force, u64>;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Clock {
    control: TimeControl,
    remaining: EnumMap<Force, Duration>,
}

impl Clock {
    pub fn new(control: TimeControl) -> Self {
        let remaining = enum_map! { _ => control.starting_time };
        Clock { control, remaining }
    }

    pub fn time_left(&self, force: Force) -> Duration { self.remaining[force] }

    pub fn is_flagged(&self, force: Force) -> bool { self.remaining[force].is_zero() }

    // Charges wall-clock time spent on the given side's turn. Called from the
    // room's single serialization point only, so a charge can never interleave
    // with a move commit.
    pub fn charge(&mut self, force: Force, elapsed: Duration) {
        self.remaining[force] = self.remaining[force].saturating_sub(elapsed);
    }

    pub fn apply_increment(&mut self, force: Force) {
        self.remaining[force] += self.control.increment;
    }

    pub fn timers(&self) -> WireTimers {
        enum_map! { force => self.remaining[force].as_secs() }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_and_flag() {
        let mut clock = Clock::new(TimeControl {
            starting_time: Duration::from_secs(3),
            increment: Duration::ZERO,
        });
        clock.charge(Force::White, Duration::from_secs(2));
        assert_eq!(clock.timers()[Force::White], 1);
        assert_eq!(clock.timers()[Force::Black], 3);
        assert!(!clock.is_flagged(Force::White));
        clock.charge(Force::White, Duration::from_secs(5));
        assert!(clock.is_flagged(Force::White));
        assert_eq!(clock.timers()[Force::White], 0);
    }

    #[test]
    fn increment_applied_to_mover() {
        let mut clock = Clock::new(TimeControl {
            starting_time: Duration::from_secs(60),
            increment: Duration::from_secs(2),
        });
        clock.charge(Force::White, Duration::from_secs(10));
        clock.apply_increment(Force::White);
        assert_eq!(clock.timers()[Force::White], 52);
    }
}
