//! Cooperative timers for the event loop.
//!
//! Nothing here runs on its own: the loop asks for the next deadline, sleeps
//! until then and collects whatever became due.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u64);

struct Timer<T> {
    handle: TimerHandle,
    due: Instant,
    interval: Option<Duration>,
    event: T,
}

pub struct Scheduler<T> {
    next_id: u64,
    timers: Vec<Timer<T>>,
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            timers: Vec::new(),
        }
    }

    fn push(&mut self, due: Instant, interval: Option<Duration>, event: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            handle,
            due,
            interval,
            event,
        });
        handle
    }

    pub fn schedule_once(&mut self, now: Instant, delay: Duration, event: T) -> TimerHandle {
        self.push(now + delay, None, event)
    }

    pub fn schedule_repeating(&mut self, now: Instant, interval: Duration, event: T) -> TimerHandle {
        // A zero period would fire on every poll.
        let interval = interval.max(Duration::from_millis(1));
        self.push(now + interval, Some(interval), event)
    }

    /// Returns false if the timer already fired (one-shot) or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Collect every event due at `now`, earliest first. One-shot timers are
    /// dropped, repeating ones move to their next period after `now`.
    pub fn fire_due(&mut self, now: Instant) -> Vec<T> {
        let mut due: Vec<(Instant, T)> = Vec::new();
        self.timers.retain_mut(|t| {
            if t.due > now {
                return true;
            }
            due.push((t.due, t.event.clone()));
            match t.interval {
                Some(interval) => {
                    while t.due <= now {
                        t.due += interval;
                    }
                    true
                }
                None => false,
            }
        });
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, e)| e).collect()
    }
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn one_shot_fires_once() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        let h = sched.schedule_once(t0, ms(100), "clear");
        assert!(sched.fire_due(t0 + ms(50)).is_empty());
        assert_eq!(sched.fire_due(t0 + ms(100)), vec!["clear"]);
        assert!(sched.fire_due(t0 + ms(500)).is_empty());
        assert!(!sched.is_scheduled(h));
    }

    #[test]
    fn repeating_fires_once_per_poll_and_rearms() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        sched.schedule_repeating(t0, ms(100), 1);
        assert_eq!(sched.fire_due(t0 + ms(100)), vec![1]);
        assert_eq!(sched.next_deadline(), Some(t0 + ms(200)));
        // Missed periods collapse into one firing.
        assert_eq!(sched.fire_due(t0 + ms(450)), vec![1]);
        assert_eq!(sched.next_deadline(), Some(t0 + ms(500)));
    }

    #[test]
    fn cancel_stops_timer() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        let h = sched.schedule_repeating(t0, ms(10), 'x');
        assert!(sched.cancel(h));
        assert!(!sched.cancel(h));
        assert!(sched.fire_due(t0 + ms(100)).is_empty());
        assert_eq!(sched.next_deadline(), None);
    }

    #[test]
    fn due_events_come_out_in_deadline_order() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        sched.schedule_once(t0, ms(30), "late");
        sched.schedule_once(t0, ms(10), "early");
        assert_eq!(sched.fire_due(t0 + ms(40)), vec!["early", "late"]);
    }

    #[test]
    fn rescheduling_after_cancel_does_not_double_fire() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        let old = sched.schedule_once(t0, ms(100), "feedback");
        sched.cancel(old);
        sched.schedule_once(t0 + ms(50), ms(100), "feedback");
        assert!(sched.fire_due(t0 + ms(120)).is_empty());
        assert_eq!(sched.fire_due(t0 + ms(150)), vec!["feedback"]);
    }
}
