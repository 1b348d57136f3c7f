//! Cooperative run flag shared by every loop
//!
//! The flag is a channel nobody sends on: dropping the [`StopHandle`]
//! disconnects it, which every [`RunFlag`] clone observes. Waiting on the
//! channel doubles as a sleep that ends early on shutdown.

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

pub fn run_flag() -> (StopHandle, RunFlag) {
    let (tx, rx) = flume::bounded(0);
    (StopHandle { _tx: tx }, RunFlag { rx })
}

pub struct StopHandle {
    _tx: Sender<()>,
}

impl StopHandle {
    pub fn stop(self) {}
}

#[derive(Clone)]
pub struct RunFlag {
    rx: Receiver<()>,
}

impl RunFlag {
    pub fn is_running(&self) -> bool {
        !self.rx.is_disconnected()
    }

    /// Sleep for `duration` or until stopped. Returns whether still running.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Disconnected) => false,
            Ok(()) | Err(RecvTimeoutError::Timeout) => true,
        }
    }

    /// Resolves once stopped
    pub async fn stopped(&self) {
        while self.rx.recv_async().await.is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn stop_is_observed_by_clones() {
        let (stop, run) = run_flag();
        let other = run.clone();
        assert!(run.is_running());
        stop.stop();
        assert!(!run.is_running());
        assert!(!other.is_running());
    }

    #[test]
    fn sleep_ends_early_on_stop() {
        let (stop, run) = run_flag();
        let sleeper = std::thread::spawn(move || {
            let started = Instant::now();
            let running = run.sleep(Duration::from_secs(30));
            (running, started.elapsed())
        });
        std::thread::sleep(Duration::from_millis(20));
        stop.stop();
        let (running, elapsed) = sleeper.join().unwrap();
        assert!(!running);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn sleep_times_out_while_running() {
        let (_stop, run) = run_flag();
        assert!(run.sleep(Duration::from_millis(5)));
    }
}
