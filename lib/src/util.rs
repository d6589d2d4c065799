use std::sync::Mutex;
use std::time::Instant;

pub struct FrameStats {
    // Updated by present() on the render thread, read from anywhere.
    inner_mutex: Mutex<FrameStatsInner>,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct FrameStatsInner {
    pub frame_count: u64,
    pub frame_time: f32, // [s], between the last two presents
    last_present_opt: Option<Instant>,
}

impl FrameStats {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner_mutex: Mutex::new(FrameStatsInner::default()),
        }
    }

    pub fn get_inner(&self) -> FrameStatsInner {
        *self.inner_mutex.lock().unwrap()
    }

    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&self, now: Instant) {
        let mut inner = self.inner_mutex.lock().unwrap();

        if let Some(last_present) = inner.last_present_opt {
            inner.frame_time = now.saturating_duration_since(last_present).as_secs_f32();
        }

        inner.last_present_opt = Some(now);
        inner.frame_count += 1;
    }

    pub fn get_frame_count(&self) -> u64 {
        self.inner_mutex.lock().unwrap().frame_count
    }

    pub fn get_frame_time(&self) -> f32 {
        self.inner_mutex.lock().unwrap().frame_time
    }

    pub fn get_frame_rate(&self) -> f32 {
        let frame_time = self.get_frame_time();

        if frame_time > 0.0 {
            1.0 / frame_time
        } else {
            0.0
        }
    }
}
