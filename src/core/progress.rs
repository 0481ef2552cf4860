//! Progress tracking for downloads

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Receives a snapshot on every chunk written
pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

/// Progress information for a download
#[derive(Debug, Clone)]
pub struct Progress {
    /// Total size across all streams in bytes
    pub total_size: u64,
    /// Bytes received across all streams
    pub downloaded_size: u64,
    /// Download progress as a percentage (0.0 to 100.0)
    pub percent: f64,
    /// Current download speed in bytes per second
    pub speed: Option<f64>,
    /// Estimated time remaining
    pub eta: Option<Duration>,
}

impl Progress {
    /// Snapshot for `downloaded` of `total` bytes, `elapsed` after start
    pub fn snapshot(total_size: u64, downloaded_size: u64, elapsed: Duration) -> Self {
        let percent = if total_size > 0 {
            (downloaded_size as f64 / total_size as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let speed = (elapsed.as_millis() > 0).then(|| downloaded_size as f64 / elapsed.as_secs_f64());
        let eta = speed
            .filter(|s| *s > 0.0 && total_size > downloaded_size)
            .map(|s| Duration::from_secs(((total_size - downloaded_size) as f64 / s) as u64));

        Self {
            total_size,
            downloaded_size,
            percent,
            speed,
            eta,
        }
    }

    /// Check if download is complete
    pub fn is_complete(&self) -> bool {
        self.total_size > 0 && self.downloaded_size >= self.total_size
    }
}

/// Shared byte counter for one download operation.
///
/// Concurrent streams add to the same counter; reports are serialized so
/// the sink never sees the total go backwards.
pub struct ProgressTracker {
    total_size: u64,
    downloaded: AtomicU64,
    reported: Mutex<u64>,
    start_time: Instant,
    sink: Option<ProgressSink>,
}

impl ProgressTracker {
    pub fn new(total_size: u64, sink: Option<ProgressSink>) -> Self {
        Self {
            total_size,
            downloaded: AtomicU64::new(0),
            reported: Mutex::new(0),
            start_time: Instant::now(),
            sink,
        }
    }

    /// Record `bytes` more and notify the sink
    pub fn record(&self, bytes: u64) {
        let downloaded = self.downloaded.fetch_add(bytes, Ordering::SeqCst) + bytes;
        let Some(sink) = &self.sink else {
            return;
        };

        let mut reported = match self.reported.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if downloaded < *reported {
            return;
        }
        *reported = downloaded;
        sink(Progress::snapshot(
            self.total_size,
            downloaded,
            self.start_time.elapsed(),
        ));
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", bytes_f64 / THRESHOLD.powi(exp as i32), UNITS[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let progress = Progress::snapshot(1000, 500, Duration::from_secs(1));
        assert_eq!(progress.percent, 50.0);
        assert_eq!(progress.speed, Some(500.0));
        assert_eq!(progress.eta, Some(Duration::from_secs(1)));
        assert!(!progress.is_complete());

        let done = Progress::snapshot(1000, 1000, Duration::from_secs(2));
        assert!(done.is_complete());
        assert_eq!(done.eta, None);
    }

    #[test]
    fn test_snapshot_unknown_total() {
        let progress = Progress::snapshot(0, 10, Duration::ZERO);
        assert_eq!(progress.percent, 0.0);
        assert!(progress.speed.is_none());
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_tracker_is_monotonic_across_threads() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = seen.clone();
            Arc::new(move |p: Progress| seen.lock().unwrap().push(p.downloaded_size))
        };
        let tracker = Arc::new(ProgressTracker::new(800, Some(sink)));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        tracker.record(4);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.downloaded(), 800);
        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(800));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }
}
