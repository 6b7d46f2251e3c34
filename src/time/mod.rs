//! Time keeping for the animation loop
//!
//! Two clocks drive the avatar: the render tick (a [`FrameClock`] advanced
//! by the caller once per displayed frame) and the scheduled tasks held in a
//! [`TimerQueue`], which fire against the frame clock's elapsed time.

pub mod clock;
pub mod timers;

pub use clock::{normalized_delta, FrameClock, REFERENCE_FRAME_RATE};
pub use timers::{ScheduledTask, TimerId, TimerQueue};
