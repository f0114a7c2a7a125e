use bevy_ecs::prelude::*;
use std::time::{Duration, Instant};

/// How often the fps estimate is refreshed.
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Frame clock: delta time, elapsed time and a once-per-second fps estimate.
#[derive(Resource)]
pub struct Timer {
    start: Option<Instant>,
    last_tick: Option<Instant>,
    delta: Duration,
    elapsed: Duration,
    frame_count: u64,
    window_start: Option<Instant>,
    window_frames: u32,
    fps: f32,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: None,
            last_tick: None,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
            window_start: None,
            window_frames: 0,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Advances the clock to `now`.
    pub fn tick_at(&mut self, now: Instant) {
        let start = *self.start.get_or_insert(now);
        self.elapsed = now.saturating_duration_since(start);
        self.delta = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_tick = Some(now);
        self.frame_count += 1;

        let window_start = *self.window_start.get_or_insert(now);
        self.window_frames += 1;
        let window = now.saturating_duration_since(window_start);
        if window >= FPS_WINDOW {
            self.fps = self.window_frames as f32 / window.as_secs_f32();
            self.window_frames = 0;
            self.window_start = Some(now);
        }
    }

    /// Time since the first tick.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn delta_time(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second over the last completed window, zero before the first one closes.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// This system update the global resource timer, it should be added to the runtime schedule.
    pub fn update_timer(mut timer: ResMut<Timer>) {
        timer.tick();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_zero_delta() {
        let mut timer = Timer::new();
        timer.tick_at(Instant::now());
        assert_eq!(timer.delta(), Duration::ZERO);
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn delta_and_elapsed_accumulate() {
        let start = Instant::now();
        let mut timer = Timer::new();
        timer.tick_at(start);
        timer.tick_at(start + Duration::from_millis(16));
        timer.tick_at(start + Duration::from_millis(40));

        assert_eq!(timer.delta(), Duration::from_millis(24));
        assert_eq!(timer.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn fps_is_measured_over_a_full_window() {
        let start = Instant::now();
        let mut timer = Timer::new();
        for frame in 0..=60 {
            timer.tick_at(start + Duration::from_millis(frame * 1000 / 60));
            if frame < 60 {
                assert_eq!(timer.fps(), 0.0);
            }
        }
        assert!((timer.fps() - 61.0).abs() < 0.5, "fps {}", timer.fps());
    }
}
