use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Callback invoked from the ticker thread once per period.
pub type TickSink = Arc<dyn Fn() + Send + Sync>;

/// Periodic timer running on its own thread.
///
/// Dropping the ticker stops the thread and waits for it, so at most one
/// ticker per owner is ever alive.
pub struct Ticker {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn start(period: Duration, sink: TickSink) -> Result<Self> {
        let period = period.max(Duration::from_millis(1));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name("alarm-ticker".to_string())
            .spawn(move || {
                let mut next_tick = Instant::now() + period;
                loop {
                    let wait = next_tick.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            sink();
                            next_tick += period;
                            let now = Instant::now();
                            if next_tick < now {
                                next_tick = now + period;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .context("failed to spawn ticker thread")?;

        Ok(Self {
            stop: Some(stop_tx),
            join: Some(join),
        })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_sink() -> (TickSink, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_for_sink = Arc::clone(&count);
        let sink: TickSink = Arc::new(move || {
            count_for_sink.fetch_add(1, Ordering::Relaxed);
        });
        (sink, count)
    }

    #[test]
    fn fires_repeatedly() {
        let (sink, count) = counting_sink();
        let ticker = Ticker::start(Duration::from_millis(10), sink).expect("ticker");
        thread::sleep(Duration::from_millis(120));
        drop(ticker);
        assert!(count.load(Ordering::Relaxed) >= 3);
    }

    #[test]
    fn drop_stops_firing() {
        let (sink, count) = counting_sink();
        let ticker = Ticker::start(Duration::from_millis(10), sink).expect("ticker");
        thread::sleep(Duration::from_millis(50));
        drop(ticker);

        let after_drop = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::Relaxed), after_drop);
    }

    #[test]
    fn drop_does_not_wait_for_a_full_period() {
        let (sink, _count) = counting_sink();
        let ticker = Ticker::start(Duration::from_secs(30), sink).expect("ticker");
        let started = Instant::now();
        drop(ticker);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
