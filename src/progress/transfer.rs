use std::time::{Duration, Instant};

use serde::Serialize;

/// Raw counters for one engine tick, mirrored from `git2::Progress`.
/// Superseded by the next tick; the unthrottled structured callback
/// receives exactly this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    pub total_objects: usize,
    pub indexed_objects: usize,
    pub received_objects: usize,
    pub local_objects: usize,
    pub total_deltas: usize,
    pub indexed_deltas: usize,
    pub received_bytes: usize,
}

impl From<&git2::Progress<'_>> for TransferSnapshot {
    fn from(p: &git2::Progress<'_>) -> Self {
        Self {
            total_objects: p.total_objects(),
            indexed_objects: p.indexed_objects(),
            received_objects: p.received_objects(),
            local_objects: p.local_objects(),
            total_deltas: p.total_deltas(),
            indexed_deltas: p.indexed_deltas(),
            received_bytes: p.received_bytes(),
        }
    }
}

/// Minimum wall-clock spacing between emitted text lines. First ticks and
/// phase-completion ticks bypass the window.
pub const EMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Per-operation reporter state: converts bursty raw ticks into throttled
/// "Receiving objects" / "Resolving deltas" lines. Each phase's 100% line
/// is emitted exactly once.
pub struct TransferReporter {
    last_emit: Option<Instant>,
    last_interval: Duration,
    last_bytes: usize,
    last_speed: String,
    receive_done: bool,
    index_done: bool,
}

impl Default for TransferReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferReporter {
    pub fn new() -> Self {
        Self {
            last_emit: None,
            last_interval: Duration::ZERO,
            last_bytes: 0,
            last_speed: "0 Byte/s".into(),
            receive_done: false,
            index_done: false,
        }
    }

    /// Process one tick against the current wall clock.
    pub fn tick(&mut self, snapshot: &TransferSnapshot) -> Vec<String> {
        self.tick_at(Instant::now(), snapshot)
    }

    /// Clock-injected variant of [`tick`](Self::tick), for deterministic
    /// callers and tests.
    pub fn tick_at(&mut self, now: Instant, s: &TransferSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.receive_done && s.received_objects <= s.total_objects {
            let completing = s.received_objects >= s.total_objects;
            if self.update_window(now, completing) {
                if !completing {
                    let speed = self.transfer_speed(s.received_bytes);
                    lines.push(format!(
                        "Receiving objects: {}% ({}/{}), {} | {}\r",
                        percent(s.received_objects, s.total_objects),
                        s.received_objects,
                        s.total_objects,
                        format_bytes(s.received_bytes as f64),
                        speed,
                    ));
                } else {
                    // The final line repeats the last computed rate rather
                    // than the (meaningless) rate of the closing tick.
                    lines.push(format!(
                        "Receiving objects: 100% ({}/{}), {} | {}, done.\n",
                        s.received_objects,
                        s.total_objects,
                        format_bytes(s.received_bytes as f64),
                        self.last_speed,
                    ));
                    self.receive_done = true;
                }
            }
        }

        if !self.index_done && self.receive_done && s.total_objects > 0 {
            let completing = s.indexed_objects >= s.total_objects;
            if self.update_window(now, completing) {
                if !completing {
                    lines.push(format!(
                        "Resolving deltas: {}% ({}/{})\r",
                        percent(s.indexed_objects, s.total_objects),
                        s.indexed_objects,
                        s.total_objects,
                    ));
                } else {
                    lines.push(format!(
                        "Resolving deltas: 100% ({}/{}), done.\n",
                        s.indexed_objects, s.total_objects,
                    ));
                    self.index_done = true;
                }
            }
        }

        lines
    }

    /// One "Sending" line for a push upload tick, same throttle rules.
    pub fn push_tick(&mut self, current: usize, total: usize, bytes: usize) -> Option<String> {
        self.push_tick_at(Instant::now(), current, total, bytes)
    }

    pub fn push_tick_at(
        &mut self,
        now: Instant,
        current: usize,
        total: usize,
        bytes: usize,
    ) -> Option<String> {
        if total == 0 {
            return None;
        }
        let completing = current >= total;
        if !self.update_window(now, completing) {
            return None;
        }
        let mut line = format!("Sending {current}/{total} {}", format_bytes(bytes as f64));
        if completing {
            line.push_str(", done.\n");
        } else {
            line.push('\r');
        }
        Some(line)
    }

    /// Decide whether this tick may emit. Always true for the very first
    /// tick and for forced (phase-completion) ticks; otherwise requires the
    /// emit interval to have elapsed. Records the inter-emission interval
    /// used for throughput.
    fn update_window(&mut self, now: Instant, force: bool) -> bool {
        if let Some(last) = self.last_emit {
            let elapsed = now.saturating_duration_since(last);
            if !force && elapsed < EMIT_INTERVAL {
                return false;
            }
            self.last_interval = elapsed;
        }
        self.last_emit = Some(now);
        true
    }

    fn transfer_speed(&mut self, bytes: usize) -> String {
        let delta = bytes.saturating_sub(self.last_bytes) as f64;
        let speed = if self.last_interval > Duration::ZERO {
            format!("{}/s", format_bytes(delta / self.last_interval.as_secs_f64()))
        } else {
            format!("{}/s", format_bytes(delta))
        };
        self.last_bytes = bytes;
        self.last_speed = speed.clone();
        speed
    }
}

#[inline]
pub fn percent(done: usize, total: usize) -> u32 {
    if total > 0 {
        ((done as f64 / total as f64) * 100.0) as u32
    } else {
        0
    }
}

/// Render a byte quantity as `N Byte`, `N.NN KiB` or `N.NN MiB`.
pub fn format_bytes(bytes: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes >= MIB {
        format!("{:.2} MiB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes / KIB)
    } else {
        format!("{} Byte", bytes as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(received: usize, total: usize, bytes: usize) -> TransferSnapshot {
        TransferSnapshot {
            total_objects: total,
            received_objects: received,
            received_bytes: bytes,
            ..TransferSnapshot::default()
        }
    }

    #[test]
    fn byte_formatting_boundaries() {
        assert_eq!(format_bytes(0.0), "0 Byte");
        assert_eq!(format_bytes(512.0), "512 Byte");
        assert_eq!(format_bytes(1023.0), "1023 Byte");
        assert_eq!(format_bytes(1024.0), "1.00 KiB");
        assert_eq!(format_bytes(2048.0), "2.00 KiB");
        assert_eq!(format_bytes(5_242_880.0), "5.00 MiB");
    }

    #[test]
    fn percent_handles_zero_total() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(25, 100), 25);
        assert_eq!(percent(1, 3), 33);
    }

    #[test]
    fn first_tick_always_emits() {
        let mut r = TransferReporter::new();
        let lines = r.tick_at(Instant::now(), &snap(1, 100, 100));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Receiving objects: 1% (1/100)"));
        assert!(lines[0].ends_with('\r'));
    }

    #[test]
    fn throttles_bursty_ticks_to_one_second_window() {
        let mut r = TransferReporter::new();
        let t0 = Instant::now();
        let mut emitted = 0;
        for (offset_ms, received) in [(0u64, 10), (300, 20), (600, 30), (900, 40), (1100, 50)] {
            let lines = r.tick_at(t0 + Duration::from_millis(offset_ms), &snap(received, 100, received * 1000));
            emitted += lines.len();
        }
        // Exactly the first tick and the one past the window.
        assert_eq!(emitted, 2);
    }

    #[test]
    fn completion_tick_bypasses_throttle_and_latches() {
        let mut r = TransferReporter::new();
        let t0 = Instant::now();
        assert_eq!(r.tick_at(t0, &snap(10, 100, 1000)).len(), 1);
        // 200 ms later the phase completes: forced emission.
        let lines = r.tick_at(t0 + Duration::from_millis(200), &snap(100, 100, 9000));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Receiving objects: 100% (100/100)"));
        assert!(lines[0].ends_with(", done.\n"));
        // Further completed ticks never re-emit the 100% line.
        let again = r.tick_at(t0 + Duration::from_millis(400), &snap(100, 100, 9000));
        assert!(again.iter().all(|l| !l.starts_with("Receiving objects")));
    }

    #[test]
    fn switches_to_delta_phase_after_download() {
        let mut r = TransferReporter::new();
        let t0 = Instant::now();
        r.tick_at(t0, &snap(100, 100, 9000));
        let mut s = snap(100, 100, 9000);
        s.indexed_objects = 50;
        let lines = r.tick_at(t0 + Duration::from_secs(2), &s);
        assert_eq!(lines, vec!["Resolving deltas: 50% (50/100)\r".to_string()]);
        s.indexed_objects = 100;
        let done = r.tick_at(t0 + Duration::from_millis(2100), &s);
        assert_eq!(
            done,
            vec!["Resolving deltas: 100% (100/100), done.\n".to_string()]
        );
        // Latched: no further delta lines.
        assert!(r.tick_at(t0 + Duration::from_secs(4), &s).is_empty());
    }

    #[test]
    fn download_completion_and_delta_progress_share_a_tick() {
        let mut r = TransferReporter::new();
        let t0 = Instant::now();
        let mut s = snap(100, 100, 9000);
        s.indexed_objects = 100;
        let lines = r.tick_at(t0, &s);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Receiving objects: 100%"));
        assert!(lines[1].starts_with("Resolving deltas: 100%"));
    }

    #[test]
    fn throughput_uses_bytes_since_last_emission() {
        let mut r = TransferReporter::new();
        let t0 = Instant::now();
        r.tick_at(t0, &snap(10, 100, 0));
        let lines = r.tick_at(t0 + Duration::from_secs(2), &snap(20, 100, 4096));
        assert_eq!(lines.len(), 1);
        // 4096 bytes over 2 seconds.
        assert!(lines[0].contains("2.00 KiB/s"), "{}", lines[0]);
    }

    #[test]
    fn push_sending_lines_follow_the_same_throttle() {
        let mut r = TransferReporter::new();
        let t0 = Instant::now();
        let first = r.push_tick_at(t0, 1, 10, 512).unwrap();
        assert_eq!(first, "Sending 1/10 512 Byte\r");
        assert!(r
            .push_tick_at(t0 + Duration::from_millis(300), 2, 10, 1024)
            .is_none());
        let done = r
            .push_tick_at(t0 + Duration::from_millis(500), 10, 10, 2048)
            .unwrap();
        assert_eq!(done, "Sending 10/10 2.00 KiB, done.\n");
        assert!(r.push_tick_at(t0, 1, 0, 512).is_none());
    }

    #[test]
    fn snapshot_serializes_for_event_payloads() {
        let s = snap(3, 10, 2048);
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["receivedObjects"], 3);
        assert_eq!(json["totalObjects"], 10);
        assert_eq!(json["receivedBytes"], 2048);
    }
}
