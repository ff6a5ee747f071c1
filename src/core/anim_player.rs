//! Frame-accurate playback of a decoded animation.
//!
//! Dwell per frame is the GIF delay (1/100 s) divided by the speed multiplier.
//! Frames go to a sink callback together with their index; the sink runs on
//! the playback thread while playing.

use image::RgbaImage;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::player::{PlaybackEngine, PlaybackStatus};
use crate::entities::media::{DEFAULT_GIF_DELAY, MediaDescriptor};

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 10.0;

/// How long a frame with `delay` (1/100 s) stays up at `speed`
pub fn frame_dwell(delay: u16, speed: f64) -> Duration {
    Duration::from_secs_f64(f64::from(delay) / 100.0 / speed)
}

pub struct AnimationPlayer {
    engine: PlaybackEngine,
    media: Arc<MediaDescriptor>,
    speed_bits: Arc<AtomicU64>,
}

impl AnimationPlayer {
    pub fn new(media: Arc<MediaDescriptor>, mut sink: impl FnMut(usize, &RgbaImage) + Send + 'static) -> Self {
        let speed_bits = Arc::new(AtomicU64::new(1.0f64.to_bits()));

        let frames = Arc::clone(&media);
        let speed = Arc::clone(&speed_bits);
        let mut engine = PlaybackEngine::new(move |index, should_block| {
            let Some(i) = usize::try_from(index).ok().filter(|&i| i < frames.frame_count()) else {
                return;
            };
            sink(i, &frames.frames[i]);
            if should_block {
                let delay = frames.delays.get(i).copied().unwrap_or(DEFAULT_GIF_DELAY);
                std::thread::sleep(frame_dwell(delay, f64::from_bits(speed.load(Ordering::Relaxed))));
            }
        });
        engine.set_max_index(media.frame_count() as i64);
        debug!("Animation player: {} frame(s)", media.frame_count());

        Self { engine, media, speed_bits }
    }

    /// Set the playback speed multiplier; rejected outside 0.1..=10
    pub fn set_speed(&self, multiplier: f64) -> bool {
        if !multiplier.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&multiplier) {
            return false;
        }
        self.speed_bits.store(multiplier.to_bits(), Ordering::Relaxed);
        true
    }

    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed_bits.load(Ordering::Relaxed))
    }

    pub fn set_direction(&mut self, direction: i64) -> bool {
        self.engine.set_direction(direction) == PlaybackStatus::Ok
    }

    /// true when now playing
    pub fn play_pause(&mut self) -> bool {
        self.engine.play_pause() == PlaybackStatus::Playing
    }

    /// true when now playing
    pub fn play_stop(&mut self) -> bool {
        self.engine.play_stop() == PlaybackStatus::Playing
    }

    pub fn stop(&mut self) -> bool {
        self.engine.stop() == PlaybackStatus::Stopped
    }

    pub fn next(&mut self) -> bool {
        self.engine.next() == PlaybackStatus::Ok
    }

    pub fn previous(&mut self) -> bool {
        self.engine.previous() == PlaybackStatus::Ok
    }

    pub fn seek(&mut self, index: i64) -> bool {
        self.engine.seek(index) == PlaybackStatus::Ok
    }

    pub fn seeker_bounds(&self) -> (i64, i64) {
        (0, self.media.frame_count() as i64 - 1)
    }

    pub fn cursor(&self) -> i64 {
        self.engine.index()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.engine.status()
    }

    pub fn media(&self) -> &Arc<MediaDescriptor> {
        &self.media
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::media::MediaKind;
    use image::Rgba;
    use std::sync::Mutex;
    use std::time::Instant;

    fn animation(delays: &[u16]) -> Arc<MediaDescriptor> {
        Arc::new(MediaDescriptor {
            kind: MediaKind::Animated,
            frames: delays
                .iter()
                .enumerate()
                .map(|(i, _)| RgbaImage::from_pixel(2, 2, Rgba([i as u8, 0, 0, 255])))
                .collect(),
            delays: delays.to_vec(),
        })
    }

    #[test]
    fn test_frame_dwell_scaling() {
        assert_eq!(frame_dwell(10, 1.0), Duration::from_millis(100));
        assert_eq!(frame_dwell(10, 2.0), Duration::from_millis(50));
        assert_eq!(frame_dwell(5, 0.5), Duration::from_millis(100));
    }

    #[test]
    fn test_speed_bounds() {
        let player = AnimationPlayer::new(animation(&[10]), |_, _| {});
        assert!(player.set_speed(2.5));
        assert_eq!(player.speed(), 2.5);
        assert!(!player.set_speed(0.0));
        assert!(!player.set_speed(f64::NAN));
        assert!(!player.set_speed(11.0));
        assert_eq!(player.speed(), 2.5);
    }

    #[test]
    fn test_sink_receives_frames() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut player = AnimationPlayer::new(animation(&[10, 10, 10]), move |i, frame| {
            sink.lock().unwrap().push((i, frame.get_pixel(0, 0)[0]));
        });

        assert!(player.next());
        assert!(player.previous());
        assert!(player.previous());
        assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (0, 0), (2, 2)]);
        assert_eq!(player.seeker_bounds(), (0, 2));
    }

    #[test]
    fn test_playback_uses_frame_delays() {
        // 10 frames of 2/100 s at 10x speed: a full cycle takes ~20ms
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        let mut player = AnimationPlayer::new(animation(&[2; 10]), move |_, _| {
            *sink.lock().unwrap() += 1;
        });
        assert!(player.set_speed(10.0));

        let start = Instant::now();
        assert!(player.play_pause());
        while *count.lock().unwrap() < 10 {
            assert!(start.elapsed() < Duration::from_secs(5));
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(player.stop());
        assert!(start.elapsed() >= Duration::from_millis(18));
        assert_eq!(player.cursor(), 0);
    }
}
