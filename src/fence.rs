use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::trace;

/// Monotonic count of completed presents.
///
/// Cloning shares the counter. Exactly one owner (the presentation driver)
/// should call [`advance_frame`](Self::advance_frame); any number of readers
/// may observe it from other threads.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    frame: Arc<AtomicU64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// Records one completed present and returns the new frame number.
    pub fn advance_frame(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::Release) + 1
    }

    pub fn fence(&self, poll_interval: Duration) -> FrameFence {
        FrameFence::new(self.clone(), poll_interval)
    }
}

/// Satisfied once the frame it captured has been presented.
#[derive(Debug)]
pub struct FrameFence {
    clock: FrameClock,
    captured: u64,
    closed: bool,
    poll_interval: Duration,
}

impl FrameFence {
    pub fn new(clock: FrameClock, poll_interval: Duration) -> Self {
        let captured = clock.current();
        Self {
            clock,
            captured,
            closed: false,
            poll_interval,
        }
    }

    pub fn captured_frame(&self) -> u64 {
        self.captured
    }

    pub fn is_signaled(&self) -> bool {
        self.closed || self.clock.current() > self.captured
    }

    /// Waits for the captured frame to pass.
    ///
    /// * `0` checks once without blocking.
    /// * negative blocks until signaled.
    /// * positive gives up after that many nanoseconds and returns `false`.
    ///
    /// There is no native wait primitive behind the counter, so blocking
    /// waits poll with short sleeps.
    pub fn await_completion(&self, timeout_nanos: i64) -> bool {
        if self.is_signaled() {
            return true;
        }
        if timeout_nanos == 0 {
            return false;
        }

        let deadline = u64::try_from(timeout_nanos)
            .ok()
            .map(|nanos| Instant::now() + Duration::from_nanos(nanos));

        trace!(
            "waiting on frame {} (now {}), timeout {timeout_nanos}ns",
            self.captured,
            self.clock.current()
        );

        loop {
            let sleep = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return self.is_signaled();
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            if sleep.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(sleep);
            }
            if self.is_signaled() {
                return true;
            }
        }
    }

    /// Releases the fence. A closed fence always reports complete.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
