//! Single-threaded cooperative loop: waits on input readiness or the next
//! timer, runs whatever is due, and returns once there is neither input
//! interest nor a pending timer.

use std::time::{Duration, Instant};

/// what the loop drives
pub trait Reactor {
    /// still registered for input readiness
    fn wants_input(&self) -> bool;

    /// block up to `timeout`; true if input can be read now
    fn wait_input(&mut self, timeout: Duration) -> bool;

    fn on_input(&mut self);

    /// called once per turn, for work arriving from other threads
    fn on_turn(&mut self) {}
}

type Callback<C> = Box<dyn FnOnce(&mut C)>;

struct Timer<C> {
    deadline: Instant,
    callback: Callback<C>,
}

pub struct EventLoop<C> {
    timers: Vec<Timer<C>>,
    tick: Duration,
}

impl<C: Reactor> EventLoop<C> {
    /// `tick` caps how long a turn waits, so `on_turn` runs at least that often
    pub fn new(tick: Duration) -> Self {
        EventLoop {
            timers: Vec::new(),
            tick,
        }
    }

    /// one-shot timer, `delay` from now
    pub fn set_timeout(&mut self, delay: Duration, callback: impl FnOnce(&mut C) + 'static) {
        self.timers.push(Timer {
            deadline: Instant::now() + delay,
            callback: Box::new(callback),
        });
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn run(&mut self, ctx: &mut C) {
        loop {
            ctx.on_turn();
            self.fire_due(ctx);
            let wait = self.next_wait();
            if ctx.wants_input() {
                if ctx.wait_input(wait) {
                    ctx.on_input();
                }
            } else if !self.timers.is_empty() {
                spin_sleep::sleep(wait);
            } else {
                // catch anything that arrived during the last turn
                ctx.on_turn();
                return;
            }
        }
    }

    fn fire_due(&mut self, ctx: &mut C) {
        let now = Instant::now();
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|t| t.deadline <= now);
        self.timers = pending;
        due.sort_by_key(|t| t.deadline);
        for timer in due {
            (timer.callback)(ctx);
        }
    }

    fn next_wait(&self) -> Duration {
        let now = Instant::now();
        self.timers
            .iter()
            .map(|t| t.deadline.saturating_duration_since(now))
            .min()
            .map_or(self.tick, |d| d.min(self.tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        open: bool,
        inputs: Vec<u8>,
        turns: usize,
        fired: Vec<&'static str>,
    }

    impl Reactor for Recorder {
        fn wants_input(&self) -> bool {
            self.open
        }

        fn wait_input(&mut self, _timeout: Duration) -> bool {
            self.inputs.len() < 3
        }

        fn on_input(&mut self) {
            self.inputs.push(self.inputs.len() as u8);
            if self.inputs.len() == 3 {
                self.open = false;
            }
        }

        fn on_turn(&mut self) {
            self.turns += 1;
        }
    }

    #[test]
    fn test_returns_with_no_work() {
        let mut el = EventLoop::new(Duration::from_millis(1));
        let mut r = Recorder::default();
        el.run(&mut r);
        assert_eq!(r.turns, 2);
    }

    #[test]
    fn test_runs_until_input_unregistered() {
        let mut el = EventLoop::new(Duration::from_millis(1));
        let mut r = Recorder {
            open: true,
            ..Default::default()
        };
        el.run(&mut r);
        assert_eq!(r.inputs, vec![0, 1, 2]);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let mut el = EventLoop::new(Duration::from_millis(5));
        el.set_timeout(Duration::from_millis(20), |r: &mut Recorder| r.fired.push("late"));
        el.set_timeout(Duration::from_millis(1), |r: &mut Recorder| r.fired.push("early"));
        let mut r = Recorder::default();
        let started = Instant::now();
        el.run(&mut r);
        assert_eq!(r.fired, vec!["early", "late"]);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(el.pending_timers(), 0);
    }

    #[test]
    fn test_timer_can_end_input() {
        struct Forever {
            open: bool,
        }
        impl Reactor for Forever {
            fn wants_input(&self) -> bool {
                self.open
            }
            fn wait_input(&mut self, timeout: Duration) -> bool {
                std::thread::sleep(timeout);
                false
            }
            fn on_input(&mut self) {}
        }

        let mut el = EventLoop::new(Duration::from_millis(2));
        el.set_timeout(Duration::from_millis(10), |f: &mut Forever| f.open = false);
        let mut f = Forever { open: true };
        el.run(&mut f);
        assert!(!f.open);
    }
}
