//! Autonomous blinking
//!
//! Two-state machine: IDLE waits a random 5-8 s, BLINKING holds for a fixed
//! 200 ms and then schedules the next wait. Only cancellation stops it.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::types::{FaceTimer, BLINK_DURATION, BLINK_INTERVAL_MS};
use crate::time::{TimerId, TimerQueue};

/// Blink state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlinkPhase {
    #[default]
    Idle,
    Blinking,
}

/// Blink timer owner
#[derive(Debug, Default)]
pub struct BlinkController {
    phase: BlinkPhase,
    pending: Option<TimerId>,
    /// When the current (or most recent) blink started
    started_at: Option<Duration>,
    blinks: u64,
}

impl BlinkController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BlinkPhase {
        self.phase
    }

    /// Whether the eyes are closed this frame
    pub fn is_active(&self) -> bool {
        self.phase == BlinkPhase::Blinking
    }

    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    pub fn last_started_at(&self) -> Option<Duration> {
        self.started_at
    }

    /// Number of completed blinks
    pub fn blinks(&self) -> u64 {
        self.blinks
    }

    /// Enter IDLE and schedule the first blink
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        queue: &mut TimerQueue<FaceTimer>,
        now: Duration,
        rng: &mut R,
    ) {
        self.cancel(queue);
        self.schedule_next(queue, now, rng);
    }

    /// Handle a fired blink timer
    ///
    /// `now` is the timer's deadline, not the frame time, so a blink lasts
    /// exactly [`BLINK_DURATION`] of clock time however coarse the frames are.
    pub fn on_timer<R: Rng + ?Sized>(
        &mut self,
        timer: FaceTimer,
        queue: &mut TimerQueue<FaceTimer>,
        now: Duration,
        rng: &mut R,
    ) {
        match (timer, self.phase) {
            (FaceTimer::BlinkStart, BlinkPhase::Idle) => {
                self.phase = BlinkPhase::Blinking;
                self.started_at = Some(now);
                self.pending =
                    Some(queue.schedule_after(now, BLINK_DURATION, FaceTimer::BlinkEnd));
                debug!(at_ms = now.as_millis() as u64, "blink start");
            }
            (FaceTimer::BlinkEnd, BlinkPhase::Blinking) => {
                self.phase = BlinkPhase::Idle;
                self.blinks += 1;
                debug!(at_ms = now.as_millis() as u64, "blink end");
                self.schedule_next(queue, now, rng);
            }
            // Stale or foreign timer
            _ => {}
        }
    }

    /// Stop the cycle and open the eyes
    pub fn cancel(&mut self, queue: &mut TimerQueue<FaceTimer>) {
        if let Some(id) = self.pending.take() {
            queue.cancel(id);
        }
        self.phase = BlinkPhase::Idle;
    }

    fn schedule_next<R: Rng + ?Sized>(
        &mut self,
        queue: &mut TimerQueue<FaceTimer>,
        now: Duration,
        rng: &mut R,
    ) {
        let delay = Duration::from_millis(rng.gen_range(BLINK_INTERVAL_MS));
        self.pending = Some(queue.schedule_after(now, delay, FaceTimer::BlinkStart));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fire_next(
        blink: &mut BlinkController,
        queue: &mut TimerQueue<FaceTimer>,
        rng: &mut StdRng,
    ) -> (FaceTimer, Duration) {
        let deadline = queue.next_deadline().unwrap();
        let task = queue.pop_due(deadline).unwrap();
        blink.on_timer(task.payload, queue, task.deadline, rng);
        (task.payload, task.deadline)
    }

    #[test]
    fn test_starts_idle() {
        let mut queue = TimerQueue::new();
        let mut blink = BlinkController::new();
        let mut rng = StdRng::seed_from_u64(5);

        blink.start(&mut queue, Duration::ZERO, &mut rng);
        assert_eq!(blink.phase(), BlinkPhase::Idle);
        assert!(!blink.is_active());

        let first = queue.next_deadline().unwrap();
        assert!(first >= Duration::from_millis(5000));
        assert!(first < Duration::from_millis(8000));
    }

    #[test]
    fn test_pulse_is_exactly_200ms() {
        let mut queue = TimerQueue::new();
        let mut blink = BlinkController::new();
        let mut rng = StdRng::seed_from_u64(11);
        blink.start(&mut queue, Duration::ZERO, &mut rng);

        for _ in 0..50 {
            let (timer, start) = fire_next(&mut blink, &mut queue, &mut rng);
            assert_eq!(timer, FaceTimer::BlinkStart);
            assert!(blink.is_active());

            let (timer, end) = fire_next(&mut blink, &mut queue, &mut rng);
            assert_eq!(timer, FaceTimer::BlinkEnd);
            assert!(!blink.is_active());
            assert_eq!(end - start, Duration::from_millis(200));

            let gap = queue.next_deadline().unwrap() - end;
            assert!(gap >= Duration::from_millis(5000) && gap < Duration::from_millis(8000));
        }
        assert_eq!(blink.blinks(), 50);
    }

    #[test]
    fn test_cancel_mid_blink_reopens_eyes() {
        let mut queue = TimerQueue::new();
        let mut blink = BlinkController::new();
        let mut rng = StdRng::seed_from_u64(2);
        blink.start(&mut queue, Duration::ZERO, &mut rng);
        fire_next(&mut blink, &mut queue, &mut rng);
        assert!(blink.is_active());

        blink.cancel(&mut queue);
        assert!(!blink.is_active());
        assert!(queue.is_empty());
        assert!(blink.pending().is_none());
    }

    #[test]
    fn test_ignores_mismatched_timer() {
        let mut queue = TimerQueue::new();
        let mut blink = BlinkController::new();
        let mut rng = StdRng::seed_from_u64(9);

        blink.on_timer(FaceTimer::BlinkEnd, &mut queue, Duration::ZERO, &mut rng);
        blink.on_timer(FaceTimer::ExpressionDrift, &mut queue, Duration::ZERO, &mut rng);
        assert_eq!(blink.phase(), BlinkPhase::Idle);
        assert!(queue.is_empty());
    }
}
