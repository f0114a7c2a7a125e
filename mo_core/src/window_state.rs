//! Window state shared between the event thread and the render thread.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Written by the event thread, read by the render thread each frame.
///
/// A resize bumps the resize generation. The render thread acknowledges a generation once its
/// swap chain and targets match it; the event thread may block on that acknowledgement.
#[derive(Debug)]
pub struct WindowState {
    width: AtomicU32,
    height: AtomicU32,
    minimized: AtomicBool,
    close_requested: AtomicBool,
    render_thread_alive: AtomicBool,
    resize_generation: AtomicU64,
    acknowledged: Mutex<u64>,
    acknowledged_signal: Condvar,
}

impl WindowState {
    pub fn new(size: [u32; 2]) -> Self {
        Self {
            width: AtomicU32::new(size[0]),
            height: AtomicU32::new(size[1]),
            minimized: AtomicBool::new(size[0] == 0 || size[1] == 0),
            close_requested: AtomicBool::new(false),
            render_thread_alive: AtomicBool::new(true),
            resize_generation: AtomicU64::new(0),
            acknowledged: Mutex::new(0),
            acknowledged_signal: Condvar::new(),
        }
    }

    pub fn size(&self) -> [u32; 2] {
        [
            self.width.load(Ordering::Acquire),
            self.height.load(Ordering::Acquire),
        ]
    }

    /// A zero-sized window renders nothing.
    pub fn is_minimized(&self) -> bool {
        self.minimized.load(Ordering::Acquire)
    }

    pub fn request_close(&self) {
        self.close_requested.store(true, Ordering::Release);
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    /// Records a new window size and returns its resize generation.
    pub fn request_resize(&self, size: [u32; 2]) -> u64 {
        self.width.store(size[0], Ordering::Release);
        self.height.store(size[1], Ordering::Release);
        self.minimized
            .store(size[0] == 0 || size[1] == 0, Ordering::Release);
        self.resize_generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn resize_generation(&self) -> u64 {
        self.resize_generation.load(Ordering::Acquire)
    }

    pub fn acknowledged_generation(&self) -> u64 {
        *self.acknowledged.lock()
    }

    /// Called by the render thread once it has caught up with `generation`.
    pub fn acknowledge(&self, generation: u64) {
        let mut acknowledged = self.acknowledged.lock();
        if generation > *acknowledged {
            *acknowledged = generation;
        }
        self.acknowledged_signal.notify_all();
    }

    /// Blocks until `generation` is acknowledged, the render thread exits or `timeout` passes.
    /// Returns whether the acknowledgement arrived.
    pub fn wait_for_ack(&self, generation: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut acknowledged = self.acknowledged.lock();
        while *acknowledged < generation {
            if !self.render_thread_alive.load(Ordering::Acquire) {
                return false;
            }
            if self
                .acknowledged_signal
                .wait_until(&mut acknowledged, deadline)
                .timed_out()
            {
                return *acknowledged >= generation;
            }
        }
        true
    }

    /// Releases every waiter; nothing will acknowledge after this.
    pub fn render_thread_exited(&self) {
        let _acknowledged = self.acknowledged.lock();
        self.render_thread_alive.store(false, Ordering::Release);
        self.acknowledged_signal.notify_all();
    }

    pub fn is_render_thread_alive(&self) -> bool {
        self.render_thread_alive.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn resize_bumps_the_generation_and_tracks_minimize() {
        let state = WindowState::new([800, 600]);
        assert!(!state.is_minimized());

        assert_eq!(state.request_resize([0, 0]), 1);
        assert!(state.is_minimized());

        assert_eq!(state.request_resize([1024, 768]), 2);
        assert!(!state.is_minimized());
        assert_eq!(state.size(), [1024, 768]);
        assert_eq!(state.resize_generation(), 2);
    }

    #[test]
    fn acknowledgement_releases_the_event_thread() {
        let state = Arc::new(WindowState::new([800, 600]));
        let generation = state.request_resize([640, 480]);

        let render = {
            let state = state.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                state.acknowledge(state.resize_generation());
            })
        };

        assert!(state.wait_for_ack(generation, Duration::from_secs(5)));
        render.join().unwrap();
        assert_eq!(state.acknowledged_generation(), generation);
    }

    #[test]
    fn wait_times_out_without_an_acknowledgement() {
        let state = WindowState::new([800, 600]);
        let generation = state.request_resize([640, 480]);

        let started = Instant::now();
        assert!(!state.wait_for_ack(generation, Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn exited_render_thread_releases_waiters() {
        let state = Arc::new(WindowState::new([800, 600]));
        let generation = state.request_resize([640, 480]);

        let render = {
            let state = state.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                state.render_thread_exited();
            })
        };

        assert!(!state.wait_for_ack(generation, Duration::from_secs(5)));
        render.join().unwrap();
        assert!(!state.is_render_thread_alive());
    }

    #[test]
    fn older_generations_never_move_the_acknowledgement_back() {
        let state = WindowState::new([800, 600]);
        state.request_resize([1, 1]);
        state.request_resize([2, 2]);

        state.acknowledge(2);
        state.acknowledge(1);

        assert_eq!(state.acknowledged_generation(), 2);
        assert!(state.wait_for_ack(1, Duration::from_millis(1)));
    }
}
