//! Channel registry: the camera list plus the shared selection state
//!
//! The current index and the last-interaction timestamp are written by the
//! touch thread and the render loop and read by the stream reader, so both
//! live behind atomics rather than a lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use tracing::info;

use crate::{CameraDescriptor, ConfigError};

pub struct ChannelRegistry {
    cameras: Vec<CameraDescriptor>,
    current: AtomicUsize,
    last_interaction: AtomicCell<Instant>,
}

impl ChannelRegistry {
    pub fn new(cameras: Vec<CameraDescriptor>) -> Result<Self, ConfigError> {
        Self::with_start(cameras, Instant::now())
    }

    /// Create a registry whose idle timer starts at `now`
    pub fn with_start(cameras: Vec<CameraDescriptor>, now: Instant) -> Result<Self, ConfigError> {
        if cameras.is_empty() {
            return Err(ConfigError::NoCameras);
        }
        Ok(Self {
            cameras,
            current: AtomicUsize::new(0),
            last_interaction: AtomicCell::new(now),
        })
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn camera(&self, index: usize) -> &CameraDescriptor {
        &self.cameras[index % self.cameras.len()]
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn current(&self) -> &CameraDescriptor {
        self.camera(self.current_index())
    }

    pub fn next(&self) -> usize {
        self.step(1)
    }

    pub fn previous(&self) -> usize {
        self.step(-1)
    }

    /// Move the selection by `delta`, wrapping in both directions.
    /// Returns the new index.
    pub fn step(&self, delta: isize) -> usize {
        let len = self.cameras.len() as isize;
        let wrap = |index: usize| (index as isize + delta).rem_euclid(len) as usize;
        // fetch_update only fails when the closure returns None
        let previous = match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |index| Some(wrap(index)))
        {
            Ok(index) | Err(index) => index,
        };
        let index = wrap(previous);
        info!("Channel {} -> {} ({})", previous, index, self.cameras[index].name);
        index
    }

    pub fn note_interaction(&self, now: Instant) {
        self.last_interaction.store(now);
    }

    pub fn last_interaction(&self) -> Instant {
        self.last_interaction.load()
    }

    /// Advance one channel if nobody has interacted for longer than
    /// `threshold`, restarting the idle timer. Returns the new index when
    /// a rotation happened.
    pub fn advance_if_idle(&self, now: Instant, threshold: Duration) -> Option<usize> {
        let last = self.last_interaction.load();
        if now.saturating_duration_since(last) <= threshold {
            return None;
        }
        // A touch landing between the load and here wins.
        self.last_interaction.compare_exchange(last, now).ok()?;
        info!("Idle for {:?}, auto-cycling", threshold);
        Some(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(count: usize) -> ChannelRegistry {
        let cameras = (0..count)
            .map(|i| CameraDescriptor {
                name: format!("cam{i}"),
                url: format!("pattern://{i}"),
            })
            .collect();
        ChannelRegistry::new(cameras).unwrap()
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(matches!(
            ChannelRegistry::new(Vec::new()),
            Err(ConfigError::NoCameras)
        ));
    }

    #[test]
    fn next_wraps_modulo_count() {
        for k in 1..5 {
            let reg = registry(k);
            for n in 1..=12 {
                reg.next();
                assert_eq!(reg.current_index(), n % k);
            }
        }
    }

    #[test]
    fn previous_from_zero_wraps_to_last() {
        let reg = registry(3);
        assert_eq!(reg.previous(), 2);
        assert_eq!(reg.current().name, "cam2");
        assert_eq!(reg.previous(), 1);
    }

    #[test]
    fn single_camera_stays_put() {
        let reg = registry(1);
        assert_eq!(reg.next(), 0);
        assert_eq!(reg.previous(), 0);
    }

    #[test]
    fn concurrent_steps_stay_in_range() {
        let reg = std::sync::Arc::new(registry(5));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if t % 2 == 0 {
                            reg.next();
                        } else {
                            reg.previous();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // equal numbers of nexts and previouses cancel out
        assert_eq!(reg.current_index(), 0);
    }

    #[test]
    fn auto_cycle_advances_once_after_threshold() {
        let start = Instant::now();
        let cameras = vec![
            CameraDescriptor { name: "a".into(), url: "pattern://a".into() },
            CameraDescriptor { name: "b".into(), url: "pattern://b".into() },
            CameraDescriptor { name: "c".into(), url: "pattern://c".into() },
        ];
        let reg = ChannelRegistry::with_start(cameras, start).unwrap();
        let threshold = Duration::from_secs(1800);

        assert_eq!(reg.advance_if_idle(start + threshold, threshold), None);

        let later = start + threshold + Duration::from_secs(1);
        assert_eq!(reg.advance_if_idle(later, threshold), Some(1));
        assert_eq!(reg.last_interaction(), later);
        // timer was reset, so the same instant does not advance again
        assert_eq!(reg.advance_if_idle(later, threshold), None);
        assert_eq!(reg.current_index(), 1);
    }

    #[test]
    fn interaction_postpones_auto_cycle() {
        let start = Instant::now();
        let reg = registry(2);
        reg.note_interaction(start);
        let threshold = Duration::from_secs(10);
        reg.note_interaction(start + Duration::from_secs(8));
        assert_eq!(reg.advance_if_idle(start + Duration::from_secs(15), threshold), None);
        assert_eq!(reg.last_interaction(), start + Duration::from_secs(8));
    }
}
