//! Input conditioning for the remote receiver and the limit-set button.
//!
//! Both samplers own a [`Timer`] that the controller advances in the timer
//! phase of the tick; sampling itself only inspects the timer state.

use core::time::Duration;

use crate::telemetry::Gesture;
use crate::time::GateInstant;
use crate::timer::{Timer, TimerState};

/// Accepts one remote trigger per receiver pulse.
///
/// The receiver holds its line high for roughly a second per button press.
/// A trigger is accepted only while the cooldown timer is idle; the timer is
/// re-opened once it has completed and the line has dropped.
#[derive(Clone, Debug)]
pub struct RemoteCooldown<I> {
    timer: Timer<I>,
}

impl<I> RemoteCooldown<I>
where
    I: GateInstant,
{
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        let mut timer = Timer::new("input-cooldown");
        timer.configure(cooldown);
        Self { timer }
    }

    /// Advances the cooldown timer.
    pub fn update(&mut self, now: I) {
        self.timer.update(now);
    }

    /// Returns `true` when `asserted` should be accepted as a trigger.
    pub fn sample(&mut self, asserted: bool, now: I) -> bool {
        match self.timer.state() {
            TimerState::None if asserted => {
                self.timer.start(now);
                true
            }
            TimerState::Complete if !asserted => {
                self.timer.reset();
                false
            }
            _ => false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.timer.state()
    }
}

/// Counts limit-set button presses inside a fixed sampling window.
///
/// The first press opens the window. Each release re-enables counting so a
/// held button counts once. When the window closes the count is classified.
#[derive(Clone, Debug)]
pub struct ButtonSampler<I> {
    window: Timer<I>,
    presses: u8,
    release_seen: bool,
}

impl<I> ButtonSampler<I>
where
    I: GateInstant,
{
    #[must_use]
    pub fn new(window: Duration, resolution: Duration) -> Self {
        let mut timer = Timer::with_resolution("press-window", resolution);
        timer.configure(window);
        Self {
            window: timer,
            presses: 0,
            release_seen: true,
        }
    }

    /// Advances the sampling window.
    pub fn update(&mut self, now: I) {
        self.window.update(now);
    }

    /// Feeds one raw button read.
    ///
    /// Returns the gesture and press count on the tick the window closes.
    pub fn sample(&mut self, pressed: bool, now: I) -> Option<(Gesture, u8)> {
        if !self.release_seen {
            if !pressed {
                self.release_seen = true;
            }
        } else if pressed && self.window.state() == TimerState::None {
            self.window.start(now);
        }

        match self.window.state() {
            TimerState::Running => {
                if pressed && self.release_seen {
                    self.presses = self.presses.saturating_add(1);
                    self.release_seen = false;
                }
                None
            }
            TimerState::Complete => {
                let presses = self.presses;
                self.presses = 0;
                self.window.reset();
                classify(presses).map(|gesture| (gesture, presses))
            }
            TimerState::None | TimerState::Paused => None,
        }
    }

    /// Presses counted in the open window.
    #[must_use]
    pub const fn presses(&self) -> u8 {
        self.presses
    }

    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.window.state()
    }
}

const fn classify(presses: u8) -> Option<Gesture> {
    match presses {
        0 => None,
        1 => Some(Gesture::SinglePress),
        2 => Some(Gesture::DoublePress),
        _ => Some(Gesture::Overflow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockInstant;

    const STEP_MS: u64 = 10;

    fn run_button(sampler: &mut ButtonSampler<MockInstant>, levels: &[bool]) -> Option<(Gesture, u8)> {
        let mut result = None;
        for (index, pressed) in levels.iter().enumerate() {
            let now = MockInstant::millis(index as u64 * STEP_MS);
            sampler.update(now);
            if let Some(found) = sampler.sample(*pressed, now) {
                result = Some(found);
            }
        }
        result
    }

    fn pattern(presses: &[(usize, usize)], total: usize) -> heapless::Vec<bool, 256> {
        let mut levels = heapless::Vec::new();
        for tick in 0..total {
            let pressed = presses
                .iter()
                .any(|(start, len)| tick >= *start && tick < start + len);
            levels.push(pressed).unwrap();
        }
        levels
    }

    fn sampler() -> ButtonSampler<MockInstant> {
        ButtonSampler::new(Duration::from_secs(1), Duration::from_millis(100))
    }

    #[test]
    fn single_press_is_reported_after_window_closes() {
        let mut sampler = sampler();
        let levels = pattern(&[(0, 20)], 150);
        assert_eq!(run_button(&mut sampler, &levels), Some((Gesture::SinglePress, 1)));
        assert_eq!(sampler.state(), TimerState::None);
    }

    #[test]
    fn two_presses_in_window_are_a_double_press() {
        let mut sampler = sampler();
        let levels = pattern(&[(0, 10), (30, 10)], 150);
        assert_eq!(run_button(&mut sampler, &levels), Some((Gesture::DoublePress, 2)));
    }

    #[test]
    fn held_button_counts_once() {
        let mut sampler = sampler();
        let levels = pattern(&[(0, 140)], 150);
        assert_eq!(run_button(&mut sampler, &levels), Some((Gesture::SinglePress, 1)));
    }

    #[test]
    fn extra_presses_overflow() {
        let mut sampler = sampler();
        let levels = pattern(&[(0, 5), (20, 5), (40, 5)], 150);
        assert_eq!(run_button(&mut sampler, &levels), Some((Gesture::Overflow, 3)));
    }

    #[test]
    fn no_gesture_without_a_press() {
        let mut sampler = sampler();
        let levels = pattern(&[], 150);
        assert_eq!(run_button(&mut sampler, &levels), None);
        assert_eq!(sampler.presses(), 0);
    }

    #[test]
    fn held_remote_signal_triggers_once() {
        let mut cooldown = RemoteCooldown::new(Duration::from_millis(1_500));
        let mut accepted = 0;
        for tick in 0..300_u64 {
            let now = MockInstant::millis(tick * STEP_MS);
            cooldown.update(now);
            if cooldown.sample(true, now) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(cooldown.state(), TimerState::Complete);
    }

    #[test]
    fn cooldown_reopens_after_signal_drops() {
        let mut cooldown = RemoteCooldown::new(Duration::from_millis(1_500));
        let mut accepted = 0;
        // 1 s pulse, 1.5 s gap, second 1 s pulse.
        for tick in 0..400_u64 {
            let now = MockInstant::millis(tick * STEP_MS);
            let asserted = tick < 100 || (250..350).contains(&tick);
            cooldown.update(now);
            if cooldown.sample(asserted, now) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
    }

    #[test]
    fn cooldown_suppresses_retrigger_while_running() {
        let mut cooldown = RemoteCooldown::new(Duration::from_millis(1_500));
        let start = MockInstant::millis(0);
        assert!(cooldown.sample(true, start));

        let later = MockInstant::millis(500);
        cooldown.update(later);
        assert!(!cooldown.sample(false, later));
        assert!(!cooldown.sample(true, later));
        assert_eq!(cooldown.state(), TimerState::Running);
    }
}
