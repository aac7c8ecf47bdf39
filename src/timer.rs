use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error};

/// A periodic timer that runs a callback on its own thread.
///
/// The timer is a scoped resource: it starts ticking on [`Ticker::start`] and
/// stops for good when the returned [`TickerHandle`] is stopped or dropped.
pub struct Ticker {
    period: Duration,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Ticker { period }
    }

    /// Starts ticking. The callback receives the wall-clock time of the tick and
    /// the number of ticks so far, starting at 1. The first tick happens one
    /// period after the start.
    pub fn start(
        &self,
        mut on_tick: impl FnMut(DateTime<Utc>, u64) + Send + 'static,
    ) -> io::Result<TickerHandle> {
        let period = self.period;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("ticker".to_string())
            .spawn(move || {
                let mut tick_count = 0;
                let mut deadline = Instant::now() + period;
                loop {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(timeout) {
                        Err(RecvTimeoutError::Timeout) => {
                            tick_count += 1;
                            on_tick(Utc::now(), tick_count);
                            deadline += period;
                        }
                        // A stop message or a dropped handle both end the timer.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Ticker stopped after {} ticks", tick_count);
            })?;

        Ok(TickerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Ownership of a running [`Ticker`]. Stopping joins the timer thread, so no
/// callback runs once [`TickerHandle::stop`] has returned.
pub struct TickerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TickerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The thread may already be gone if the callback panicked.
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Ticker thread panicked");
            }
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Ticker;

    #[test]
    fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicU64::new(0));
        let handle = {
            let count = Arc::clone(&count);
            Ticker::new(Duration::from_millis(5))
                .start(move |_, n| count.store(n, Ordering::SeqCst))
                .unwrap()
        };
        thread::sleep(Duration::from_millis(60));
        handle.stop();

        let stopped_at = count.load(Ordering::SeqCst);
        assert!(stopped_at > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn test_drop_stops_ticker() {
        let count = Arc::new(AtomicU64::new(0));
        {
            let count = Arc::clone(&count);
            let _handle = Ticker::new(Duration::from_millis(5))
                .start(move |_, _| {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        let stopped_at = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn test_stop_before_first_tick() {
        let count = Arc::new(AtomicU64::new(0));
        let handle = {
            let count = Arc::clone(&count);
            Ticker::new(Duration::from_secs(60))
                .start(move |_, _| {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };
        handle.stop();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
