//! Monotonic time abstraction shared by every time-gated component.
//!
//! The core never reads a clock. Callers capture one instant per tick and hand
//! it to every timer so that all decisions in a tick see the same snapshot.

use core::time::Duration;

/// Trait implemented by monotonic instant wrappers used by the controller.
pub trait GateInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}
