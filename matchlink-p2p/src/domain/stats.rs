use instant::{Duration, Instant};
use serde::Serialize;

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Per-peer traffic counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrafficStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    /// Unordered messages rejected as already seen
    pub dropped_duplicates: u64,
    /// Unordered messages rejected as behind the window
    pub dropped_stale: u64,
    /// Unreliable sends discarded because the peer had not joined
    pub dropped_before_join: u64,
    /// Upload over the last completed one-second window
    pub upload_bytes_per_sec: u64,
    /// Download over the last completed one-second window
    pub download_bytes_per_sec: u64,
    #[serde(skip)]
    window: RateWindow,
}

#[derive(Debug, Clone, Default)]
struct RateWindow {
    started: Option<Instant>,
    uploaded: u64,
    downloaded: u64,
}

impl TrafficStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
        self.window.uploaded += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.messages_received += 1;
        self.bytes_received += bytes as u64;
        self.window.downloaded += bytes as u64;
    }

    /// Close the rate window once a second has passed
    pub fn roll(&mut self, now: Instant) {
        let started = *self.window.started.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        if elapsed < RATE_WINDOW {
            return;
        }

        let millis = elapsed.as_millis().max(1) as u64;
        self.upload_bytes_per_sec = self.window.uploaded * 1000 / millis;
        self.download_bytes_per_sec = self.window.downloaded * 1000 / millis;
        self.window = RateWindow {
            started: Some(now),
            uploaded: 0,
            downloaded: 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut stats = TrafficStats::default();
        stats.record_sent(10);
        stats.record_sent(5);
        stats.record_received(7);

        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.bytes_sent, 15);
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.bytes_received, 7);
    }

    #[test]
    fn test_rolling_rate() {
        let start = Instant::now();
        let mut stats = TrafficStats::default();
        stats.roll(start);

        stats.record_sent(500);
        stats.record_received(250);
        stats.roll(start + Duration::from_millis(400));
        assert_eq!(stats.upload_bytes_per_sec, 0);

        stats.roll(start + Duration::from_secs(1));
        assert_eq!(stats.upload_bytes_per_sec, 500);
        assert_eq!(stats.download_bytes_per_sec, 250);

        // Next window starts empty
        stats.roll(start + Duration::from_secs(2));
        assert_eq!(stats.upload_bytes_per_sec, 0);
        assert_eq!(stats.bytes_sent, 500);
    }
}
