//! Time source and loop pacing
//!
//! The control loop reads time only through [`Clock`], so tests can drive it with a
//! deterministic [`SimulatedClock`].

use std::cell::Cell;
use std::hint::spin_loop;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time since an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that moves only when told to, plus a fixed tick on every read.
///
/// The per-read tick stands in for the time a busy-wait iteration takes, so a pacing
/// loop on this clock always terminates.
#[derive(Debug)]
pub struct SimulatedClock {
    now: Cell<Duration>,
    tick: Duration,
}

impl SimulatedClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            tick: tick.max(Duration::from_nanos(1)),
        }
    }

    /// Move time forward, e.g. to emulate cycle work.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Current time without ticking
    pub fn peek(&self) -> Duration {
        self.now.get()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        let t = self.now.get();
        self.now.set(t + self.tick);
        t
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Result of enforcing one loop period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodOutcome {
    /// Work finished in time; the remainder was spent busy-waiting.
    OnTime { work: Duration },
    /// Work alone took longer than the period.
    Overrun { work: Duration },
}

impl PeriodOutcome {
    pub fn work(&self) -> Duration {
        match *self {
            PeriodOutcome::OnTime { work } | PeriodOutcome::Overrun { work } => work,
        }
    }

    pub fn is_overrun(&self) -> bool {
        matches!(self, PeriodOutcome::Overrun { .. })
    }
}

/// Busy-wait until `period` has elapsed since `cycle_start`.
pub fn enforce_period(clock: &dyn Clock, cycle_start: Duration, period: Duration) -> PeriodOutcome {
    let work = clock.now().saturating_sub(cycle_start);
    if work >= period {
        return PeriodOutcome::Overrun { work };
    }
    while clock.now().saturating_sub(cycle_start) < period {
        spin_loop();
    }
    PeriodOutcome::OnTime { work }
}

/// Cycle counters of a running loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    pub cycles: u64,
    pub overruns: u64,
    pub last_cycle: Duration,
    pub max_cycle: Duration,
}

impl LoopStats {
    pub fn record(&mut self, outcome: PeriodOutcome) {
        let work = outcome.work();
        self.cycles += 1;
        if outcome.is_overrun() {
            self.overruns += 1;
        }
        self.last_cycle = work;
        self.max_cycle = self.max_cycle.max(work);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_clock_ticks_on_read() {
        let clock = SimulatedClock::new(Duration::from_micros(10));
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_micros(10));
        clock.advance(Duration::from_millis(1));
        assert_eq!(clock.peek(), Duration::from_micros(1020));
    }

    #[test]
    fn test_enforce_period_waits_out_the_period() {
        let clock = SimulatedClock::new(Duration::from_micros(50));
        let start = clock.now();
        clock.advance(Duration::from_micros(300));

        let outcome = enforce_period(&clock, start, Duration::from_millis(1));
        assert!(!outcome.is_overrun());
        assert!(clock.peek() >= Duration::from_millis(1));
        assert!(clock.peek() < Duration::from_micros(1100));
    }

    #[test]
    fn test_enforce_period_flags_overrun() {
        let clock = SimulatedClock::new(Duration::from_micros(1));
        let start = clock.now();
        clock.advance(Duration::from_millis(3));

        let before = clock.peek();
        let outcome = enforce_period(&clock, start, Duration::from_millis(1));
        assert!(outcome.is_overrun());
        assert!(outcome.work() >= Duration::from_millis(3));
        // No waiting after an overrun
        assert_eq!(clock.peek(), before + Duration::from_micros(1));
    }

    #[test]
    fn test_monotonic_clock_pacing() {
        let clock = MonotonicClock::new();
        let start = clock.now();
        let outcome = enforce_period(&clock, start, Duration::from_millis(2));
        assert!(!outcome.is_overrun());
        assert!(clock.now() - start >= Duration::from_millis(2));
    }

    #[test]
    fn test_stats_track_overruns() {
        let mut stats = LoopStats::default();
        stats.record(PeriodOutcome::OnTime { work: Duration::from_micros(200) });
        stats.record(PeriodOutcome::Overrun { work: Duration::from_millis(2) });
        stats.record(PeriodOutcome::OnTime { work: Duration::from_micros(100) });

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.last_cycle, Duration::from_micros(100));
        assert_eq!(stats.max_cycle, Duration::from_millis(2));
    }

    #[test]
    fn test_shared_clock_through_rc() {
        let clock = Rc::new(SimulatedClock::new(Duration::from_micros(5)));
        let boxed: Box<dyn Clock> = Box::new(Rc::clone(&clock));
        boxed.now();
        assert_eq!(clock.peek(), Duration::from_micros(5));
    }
}
