//! Slideshow over an ordered list of item keys.
//!
//! Binds a [`PlaybackEngine`] to a key list: every frame event is resolved to
//! `(index, keys snapshot, should_block)` and forwarded to the frame observer.
//! The observer returns whether it actually displayed the item; the slideshow
//! interval is only waited out for displayed items while playing, so files
//! that fail to decode are skipped without a pause.
//!
//! Replacing the list re-arms the engine bound and fires the data-changed hook.

use log::{debug, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::player::{Action, PlaybackEngine, PlaybackStatus};

/// Default slideshow dwell per item
pub const DEFAULT_INTERVAL_MS: u64 = 200;

/// Frame observer: (index, keys, should_block) -> displayed
pub type FrameObserver = Box<dyn FnMut(usize, &Arc<[String]>, bool) -> bool + Send>;

/// State read by the engine callback on the playback thread
struct Shared {
    keys: Mutex<Arc<[String]>>,
    observer: Mutex<Option<FrameObserver>>,
    interval_ms: AtomicU64,
}

pub struct ListPlayer {
    engine: PlaybackEngine,
    shared: Arc<Shared>,
    on_data_changed: Option<Box<dyn FnMut(usize) + Send>>,
    on_play: Option<Box<dyn FnMut(&Arc<[String]>) + Send>>,
}

impl ListPlayer {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            keys: Mutex::new(Arc::from(Vec::new())),
            observer: Mutex::new(None),
            interval_ms: AtomicU64::new(DEFAULT_INTERVAL_MS),
        });

        let cb_shared = Arc::clone(&shared);
        let engine = PlaybackEngine::new(move |index, should_block| {
            on_engine_frame(&cb_shared, index, should_block);
        });

        Self {
            engine,
            shared,
            on_data_changed: None,
            on_play: None,
        }
    }

    pub fn set_on_frame(&mut self, observer: impl FnMut(usize, &Arc<[String]>, bool) -> bool + Send + 'static) {
        *self.shared.observer.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(observer));
    }

    /// Fired with the new length after every list replacement
    pub fn set_on_data_changed(&mut self, hook: impl FnMut(usize) + Send + 'static) {
        self.on_data_changed = Some(Box::new(hook));
    }

    /// Fired with the current list every time play_pause transitions into Playing
    pub fn set_on_play(&mut self, hook: impl FnMut(&Arc<[String]>) + Send + 'static) {
        self.on_play = Some(Box::new(hook));
    }

    /// Replace the playlist. An empty list stops running playback.
    pub fn set_new_data(&mut self, keys: Vec<String>) {
        let len = keys.len();
        *self.shared.keys.lock().unwrap_or_else(|e| e.into_inner()) = Arc::from(keys);
        if len == 0 && self.engine.is_running() {
            debug!("Playlist emptied while playing, stopping");
            self.engine.stop();
        }
        self.engine.set_max_index(len as i64);
        debug!("Playlist replaced: {} item(s)", len);
        if let Some(hook) = self.on_data_changed.as_mut() {
            hook(len);
        }
    }

    /// Toggle playback; true when now playing
    pub fn play_pause(&mut self) -> bool {
        let playing = self.engine.play_pause() == PlaybackStatus::Playing;
        if playing {
            let keys = self.list();
            if let Some(hook) = self.on_play.as_mut() {
                hook(&keys);
            }
        }
        playing
    }

    /// Toggle play/stop; true when now playing
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

    /// Seek within the seeker bounds
    pub fn seek(&mut self, index: i64) -> bool {
        let (_, upper) = self.seeker_bounds();
        self.engine.seek(index.min(upper)) == PlaybackStatus::Ok
    }

    /// Seek to the first occurrence of `key`; false when absent
    pub fn seek_to_data(&mut self, key: &str) -> bool {
        let found = self.list().iter().position(|k| k == key);
        match found {
            Some(index) => {
                self.seek(index as i64);
                true
            }
            None => false,
        }
    }

    /// Raw engine dispatch (command console)
    pub fn dispatch(&mut self, action: Action, args: &[i64]) -> PlaybackStatus {
        self.engine.dispatch(action, args)
    }

    /// (first, last) seekable index
    pub fn seeker_bounds(&self) -> (i64, i64) {
        (0, self.len() as i64 - 1)
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current keys
    pub fn list(&self) -> Arc<[String]> {
        Arc::clone(&*self.shared.keys.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn cursor(&self) -> i64 {
        self.engine.index()
    }

    /// Key under the cursor
    pub fn current(&self) -> Option<String> {
        let index = usize::try_from(self.cursor()).ok()?;
        self.list().get(index).cloned()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.engine.status()
    }

    pub fn set_interval(&self, interval: Duration) {
        self.shared
            .interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::Relaxed))
    }

    /// Time a full pass takes at the current interval (decode time excluded)
    pub fn estimated_playtime(&self) -> Duration {
        self.interval() * self.len() as u32
    }
}

impl Default for ListPlayer {
    fn default() -> Self {
        Self::new()
    }
}

fn on_engine_frame(shared: &Shared, index: i64, should_block: bool) {
    let keys = Arc::clone(&*shared.keys.lock().unwrap_or_else(|e| e.into_inner()));
    if keys.is_empty() {
        trace!("Frame {} on empty playlist", index);
        return;
    }
    // cursor may sit one past the end right after the list shrank
    let index = usize::try_from(index).ok().filter(|&i| i < keys.len()).unwrap_or(0);

    let displayed = match shared.observer.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
        Some(observer) => observer(index, &keys, should_block),
        None => false,
    };

    if should_block && displayed {
        std::thread::sleep(Duration::from_millis(shared.interval_ms.load(Ordering::Relaxed)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("/pics/{:02}.png", i)).collect()
    }

    type Seen = Arc<Mutex<Vec<(usize, String, bool)>>>;

    fn observed_player(displayed: bool) -> (ListPlayer, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut player = ListPlayer::new();
        player.set_on_frame(move |index, keys, block| {
            sink.lock().unwrap().push((index, keys[index].clone(), block));
            displayed
        });
        (player, seen)
    }

    #[test]
    fn test_observer_gets_resolved_key() {
        let (mut player, seen) = observed_player(true);
        player.set_new_data(keys(4));
        assert!(player.next());
        assert!(player.seek(3));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, "/pics/01.png".to_string(), false), (3, "/pics/03.png".to_string(), false)]
        );
        assert_eq!(player.current().as_deref(), Some("/pics/03.png"));
    }

    #[test]
    fn test_seek_to_data() {
        let (mut player, _seen) = observed_player(true);
        player.set_new_data(keys(5));
        assert!(player.seek_to_data("/pics/02.png"));
        assert_eq!(player.cursor(), 2);
        assert!(!player.seek_to_data("/pics/99.png"));
        assert_eq!(player.cursor(), 2);
    }

    #[test]
    fn test_set_new_data_rearms_and_notifies() {
        let (mut player, _seen) = observed_player(true);
        let changed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changed);
        player.set_on_data_changed(move |len| {
            counter.fetch_add(len, Ordering::SeqCst);
        });

        player.set_new_data(keys(10));
        player.seek(8);
        player.set_new_data(keys(3));

        assert_eq!(changed.load(Ordering::SeqCst), 13);
        assert_eq!(player.cursor(), 0);
        assert_eq!(player.len(), 3);
        assert_eq!(player.seeker_bounds(), (0, 2));
    }

    #[test]
    fn test_seek_limited_to_last_item() {
        let (mut player, seen) = observed_player(true);
        player.set_new_data(keys(3));
        player.seek(50);
        assert_eq!(player.cursor(), 2);
        assert_eq!(seen.lock().unwrap().last().map(|s| s.0), Some(2));
    }

    #[test]
    fn test_empty_playlist_does_not_play() {
        let mut player = ListPlayer::new();
        let played = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&played);
        player.set_on_play(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!player.play_pause());
        assert_eq!(played.load(Ordering::SeqCst), 0);
        assert!(!player.stop());
    }

    #[test]
    fn test_emptied_playlist_stops_playback() {
        let (mut player, seen) = observed_player(true);
        player.set_interval(Duration::from_millis(5));
        player.set_new_data(keys(3));
        assert!(player.play_pause());

        player.set_new_data(Vec::new());
        assert_eq!(player.status(), PlaybackStatus::Stopped);
        assert_eq!(player.cursor(), 0);

        let frames = seen.lock().unwrap().len();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(seen.lock().unwrap().len(), frames);
        assert!(!player.play_pause());
    }

    #[test]
    fn test_on_play_hook_and_stop() {
        let (mut player, seen) = observed_player(true);
        player.set_interval(Duration::from_millis(5));
        player.set_new_data(keys(3));
        let played = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&played);
        player.set_on_play(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(player.play_pause());
        assert!(!player.play_pause());
        assert!(player.play_pause());
        assert_eq!(played.load(Ordering::SeqCst), 2);
        assert!(player.stop());
        assert_eq!(seen.lock().unwrap().last(), Some(&(0, "/pics/00.png".to_string(), false)));
    }

    #[test]
    fn test_undisplayed_items_skip_interval() {
        let (mut player, seen) = observed_player(false);
        player.set_interval(Duration::from_secs(5));
        player.set_new_data(keys(4));

        player.play_pause();
        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.lock().unwrap().iter().filter(|s| s.2).count() < 8 {
            assert!(Instant::now() < deadline, "interval applied to undisplayed items");
            std::thread::sleep(Duration::from_millis(1));
        }
        player.stop();
    }

    #[test]
    fn test_interval_applied_to_displayed_items() {
        let (mut player, seen) = observed_player(true);
        player.set_interval(Duration::from_millis(40));
        player.set_new_data(keys(4));

        player.play_pause();
        std::thread::sleep(Duration::from_millis(100));
        player.stop();
        let blocking = seen.lock().unwrap().iter().filter(|s| s.2).count();
        assert!((1..=4).contains(&blocking), "got {} blocking frames", blocking);
    }

    #[test]
    fn test_estimated_playtime() {
        let mut player = ListPlayer::new();
        player.set_new_data(keys(25));
        player.set_interval(Duration::from_millis(200));
        assert_eq!(player.estimated_playtime(), Duration::from_secs(5));
    }
}
