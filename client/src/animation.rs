use frontline_shared::BattleRecord;

/// Minimum interval between elapsed-time pushes to reactive state.
pub const CLOCK_PUSH_INTERVAL_MS: f64 = 50.0;
/// How often the frame monitor reports to the console.
pub const FPS_REPORT_INTERVAL_MS: f64 = 2000.0;
const FRAME_WINDOW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockState {
    Idle,
    Running { started_at: f64, last_push: f64 },
}

/// Single shared animation time source.
///
/// Every transition (idle to running or back) resets elapsed time to 0; the
/// clock never pauses and resumes. While running, `on_frame` recomputes the
/// elapsed time each frame but only returns a value to push at most every
/// [`CLOCK_PUSH_INTERVAL_MS`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClock {
    state: ClockState,
    elapsed: f64,
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self {
            state: ClockState::Idle,
            elapsed: 0.0,
        }
    }
}

impl AnimationClock {
    pub fn is_running(&self) -> bool {
        matches!(self.state, ClockState::Running { .. })
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Last pushed elapsed time in ms. Always 0 while idle.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed
    }

    pub fn start(&mut self, now: f64) {
        if self.is_running() {
            return;
        }
        self.state = ClockState::Running {
            started_at: now,
            last_push: f64::NEG_INFINITY,
        };
        self.elapsed = 0.0;
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Idle;
        self.elapsed = 0.0;
    }

    /// Start or stop to match whether anything animated is on screen.
    /// Returns true when the state changed.
    pub fn set_required(&mut self, required: bool, now: f64) -> bool {
        match (required, self.is_running()) {
            (true, false) => {
                self.start(now);
                true
            }
            (false, true) => {
                self.stop();
                true
            }
            _ => false,
        }
    }

    /// Advance on an animation frame. Returns the new elapsed time when it
    /// should be pushed to consumers.
    pub fn on_frame(&mut self, now: f64) -> Option<f64> {
        let ClockState::Running {
            started_at,
            last_push,
        } = self.state
        else {
            return None;
        };
        if now - last_push < CLOCK_PUSH_INTERVAL_MS {
            return None;
        }
        // Monotonic even if the host clock jitters backwards.
        let elapsed = (now - started_at).max(self.elapsed);
        self.state = ClockState::Running {
            started_at,
            last_push: now,
        };
        self.elapsed = elapsed;
        Some(elapsed)
    }
}

/// True while a battle is live or a zone reveal is playing.
pub fn animation_required(battles: &[BattleRecord], selected_zone: Option<&str>) -> bool {
    selected_zone.is_some() || battles.iter().any(BattleRecord::is_active)
}

/// Frame-time sink fed on every animation frame, independent of the clock's push throttle.
#[derive(Debug, Clone, Default)]
pub struct FrameMonitor {
    deltas: std::collections::VecDeque<f64>,
    last_frame: Option<f64>,
    last_report: f64,
    total_frames: u64,
}

impl FrameMonitor {
    pub fn record(&mut self, now: f64) {
        if let Some(prev) = self.last_frame {
            let delta = (now - prev).max(0.0);
            if self.deltas.len() == FRAME_WINDOW {
                self.deltas.pop_front();
            }
            self.deltas.push_back(delta);
        }
        self.last_frame = Some(now);
        self.total_frames += 1;
    }

    /// Forget the previous timestamp so an idle gap is not counted as a frame.
    pub fn reset_gap(&mut self) {
        self.last_frame = None;
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn average_frame_ms(&self) -> Option<f64> {
        if self.deltas.is_empty() {
            return None;
        }
        Some(self.deltas.iter().sum::<f64>() / self.deltas.len() as f64)
    }

    pub fn fps(&self) -> Option<f64> {
        self.average_frame_ms()
            .filter(|ms| *ms > 0.0)
            .map(|ms| 1000.0 / ms)
    }

    /// Summary line if a report is due.
    pub fn take_report(&mut self, now: f64) -> Option<String> {
        if now - self.last_report < FPS_REPORT_INTERVAL_MS {
            return None;
        }
        let fps = self.fps()?;
        self.last_report = now;
        let avg = self.average_frame_ms().unwrap_or_default();
        Some(format!("frames: {fps:.1} fps ({avg:.2} ms avg)"))
    }
}

/// Cubic ease-out: decelerating to zero velocity.
pub fn cubic_ease_out(t: f64) -> f64 {
    let t = t - 1.0;
    t * t * t + 1.0
}

pub fn ease_in_out_sine(t: f64) -> f64 {
    -((std::f64::consts::PI * t.clamp(0.0, 1.0)).cos() - 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idle_clock_stays_at_zero() {
        let mut clock = AnimationClock::default();
        assert_eq!(clock.on_frame(100.0), None);
        assert_eq!(clock.on_frame(5000.0), None);
        assert_eq!(clock.elapsed_ms(), 0.0);
        assert!(!clock.set_required(false, 6000.0));
        assert_eq!(clock.elapsed_ms(), 0.0);
    }

    #[test]
    fn running_clock_increases_and_throttles_pushes() {
        let mut clock = AnimationClock::default();
        assert!(clock.set_required(true, 1000.0));
        assert_eq!(clock.on_frame(1000.0), Some(0.0));
        assert_eq!(clock.on_frame(1016.0), None);
        assert_eq!(clock.on_frame(1033.0), None);
        assert_eq!(clock.on_frame(1050.0), Some(50.0));
        let mut last = clock.elapsed_ms();
        for f in 1..40 {
            if let Some(t) = clock.on_frame(1050.0 + f as f64 * 16.7) {
                assert!(t > last);
                last = t;
            }
        }
        assert!(last > 500.0);
    }

    #[test]
    fn every_activation_starts_fresh() {
        let mut clock = AnimationClock::default();
        clock.start(0.0);
        clock.on_frame(400.0);
        assert_eq!(clock.elapsed_ms(), 400.0);
        assert!(clock.set_required(false, 500.0));
        assert_eq!(clock.elapsed_ms(), 0.0);
        assert!(clock.set_required(true, 10_000.0));
        assert_eq!(clock.on_frame(10_000.0), Some(0.0));
    }

    #[test]
    fn required_by_active_battles_or_zone() {
        let battles: Vec<BattleRecord> = serde_json::from_value(json!([
            { "id": "b1", "target_hex_id": "1-1", "attacker_community_id": "A", "status": "ended" }
        ]))
        .expect("battles should deserialize");
        assert!(!animation_required(&battles, None));
        assert!(animation_required(&battles, Some("iron")));
        let live: Vec<BattleRecord> = serde_json::from_value(json!([
            { "id": "b2", "target_hex_id": "1-1", "attacker_community_id": "A", "status": "active" }
        ]))
        .expect("battles should deserialize");
        assert!(animation_required(&live, None));
    }

    #[test]
    fn frame_monitor_records_every_frame() {
        let mut monitor = FrameMonitor::default();
        for i in 0..10 {
            monitor.record(i as f64 * 20.0);
        }
        assert_eq!(monitor.total_frames(), 10);
        assert_eq!(monitor.average_frame_ms(), Some(20.0));
        assert_eq!(monitor.fps(), Some(50.0));
        assert!(monitor.take_report(2500.0).is_some());
        assert!(monitor.take_report(2600.0).is_none());
    }

    #[test]
    fn easing_endpoints() {
        assert_eq!(cubic_ease_out(0.0), 0.0);
        assert_eq!(cubic_ease_out(1.0), 1.0);
        assert!(ease_in_out_sine(0.0).abs() < 1e-12);
        assert!((ease_in_out_sine(1.0) - 1.0).abs() < 1e-12);
        assert!((ease_in_out_sine(0.5) - 0.5).abs() < 1e-12);
    }
}
