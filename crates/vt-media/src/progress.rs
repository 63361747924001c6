//! FFmpeg progress parsing.
//!
//! FFmpeg prints a `Duration: HH:MM:SS.cc` header for each input and then
//! periodic status lines such as
//! `frame=  250 fps= 25 q=28.0 size=    1024kB time=00:00:10.00 bitrate= 838.9kbits/s`.
//! Output arrives in arbitrary chunks, so [`ProgressParser`] accumulates it
//! in a buffer and only interprets complete fixed-width fields.

use vt_models::{Stats, INDETERMINATE_DURATION};

const DURATION_MARKER: &str = "Duration";
/// `Duration: ` plus the field start.
const DURATION_OFFSET: usize = 10;
/// Duration field of a source with no known length.
const UNKNOWN_DURATION: &str = "N/A";
const TIME_MARKER: &str = "time=";
/// Width of an `HH:MM:SS` field.
const FIELD_WIDTH: usize = 8;
/// Bytes kept while no duration marker has been seen.
const PRE_DURATION_TAIL: usize = 64;
/// Upper bound on buffered output while waiting for a time field.
const MAX_BUFFER: usize = 16 * 1024;

/// Incremental parser turning FFmpeg diagnostic output into [`Stats`].
#[derive(Debug, Default)]
pub struct ProgressParser {
    buf: String,
    stats: Stats,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest parsed figures.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Feed a chunk of output.
    ///
    /// Returns updated stats when something observable changed: the
    /// duration became known, or the percentage grew.
    pub fn feed(&mut self, chunk: &str) -> Option<Stats> {
        self.buf.push_str(chunk);

        let changed = if self.stats.duration == 0 {
            // Progress may follow the header in the same chunk
            let found = self.parse_duration();
            let progressed = self.stats.duration != 0 && self.parse_progress();
            found || progressed
        } else {
            self.parse_progress()
        };

        changed.then(|| self.stats.clone())
    }

    fn parse_duration(&mut self) -> bool {
        let Some(idx) = self.buf.find(DURATION_MARKER) else {
            keep_tail(&mut self.buf, PRE_DURATION_TAIL);
            return false;
        };

        let start = idx + DURATION_OFFSET;
        if self
            .buf
            .get(start..)
            .is_some_and(|rest| rest.starts_with(UNKNOWN_DURATION))
        {
            self.buf.drain(..start + UNKNOWN_DURATION.len());
            self.stats.duration = INDETERMINATE_DURATION;
            self.stats.percentage = 100;
            return true;
        }

        if self.buf.len() <= start + FIELD_WIDTH {
            // Field not complete yet
            self.buf.drain(..idx);
            return false;
        }

        let Some(field) = self.buf.get(start..start + FIELD_WIDTH).map(str::to_string) else {
            self.buf.clear();
            return false;
        };
        self.buf.drain(..start + FIELD_WIDTH);

        match hms_to_secs(&field) {
            Some(secs) if secs > 0 => {
                self.stats.duration = secs;
                true
            }
            _ => {
                self.buf.clear();
                false
            }
        }
    }

    fn parse_progress(&mut self) -> bool {
        let Some(idx) = self.buf.find(TIME_MARKER) else {
            keep_tail(&mut self.buf, MAX_BUFFER);
            return false;
        };

        let start = idx + TIME_MARKER.len();
        if self.buf.len() < start + FIELD_WIDTH {
            return false;
        }

        let Some(field) = self.buf.get(start..start + FIELD_WIDTH) else {
            self.buf.clear();
            return false;
        };
        let Some(elapsed) = hms_to_secs(field) else {
            self.buf.clear();
            return false;
        };

        let percentage = if self.stats.is_indeterminate() {
            100
        } else {
            (elapsed.saturating_mul(100) / self.stats.duration).clamp(0, 100) as u8
        };

        let grew = percentage > self.stats.percentage;
        if grew {
            self.stats.percentage = percentage;
            self.stats.time = field.to_string();
            self.stats.frame = field_after(&self.buf, "frame=")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            self.stats.fps = field_after(&self.buf, "fps=")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0);
            self.stats.bitrate = field_after(&self.buf, "bitrate=")
                .unwrap_or_default()
                .to_string();
            self.stats.size = field_after(&self.buf, "size=")
                .unwrap_or_default()
                .to_string();
        }

        self.buf.clear();
        grew
    }
}

/// Parse `HH:MM:SS` into seconds.
fn hms_to_secs(field: &str) -> Option<i64> {
    let mut parts = field.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let h: i64 = h.trim().parse().ok()?;
    let m: i64 = m.trim().parse().ok()?;
    let s: i64 = s.trim().parse().ok()?;
    if h < 0 || m < 0 || s < 0 {
        return None;
    }
    Some(h * 3600 + m * 60 + s)
}

/// Value following the last occurrence of `marker`, up to the next whitespace.
fn field_after<'a>(buf: &'a str, marker: &str) -> Option<&'a str> {
    let idx = buf.rfind(marker)?;
    let rest = buf[idx + marker.len()..].trim_start();
    let value = rest.split_whitespace().next()?;
    (!value.is_empty()).then_some(value)
}

/// Drop all but the last `n` bytes, respecting char boundaries.
fn keep_tail(buf: &mut String, n: usize) {
    if buf.len() <= n {
        return;
    }
    let mut cut = buf.len() - n;
    while !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Input #0, matroska,webm, from 'in.mkv':\n  Duration: 00:01:40.00, start: 0.000000, bitrate: 5000 kb/s\n";
    const HALFWAY: &str = "frame= 1250 fps= 48 q=28.0 size=    4096kB time=00:00:50.00 bitrate= 671.1kbits/s speed=1.9x\r";

    #[test]
    fn test_duration_then_progress() {
        let mut parser = ProgressParser::new();

        let stats = parser.feed(HEADER).expect("duration signal");
        assert_eq!(stats.duration, 100);
        assert_eq!(stats.percentage, 0);

        let stats = parser.feed(HALFWAY).expect("progress signal");
        assert_eq!(stats.percentage, 50);
        assert_eq!(stats.frame, 1250);
        assert!((stats.fps - 48.0).abs() < f64::EPSILON);
        assert_eq!(stats.size, "4096kB");
        assert_eq!(stats.bitrate, "671.1kbits/s");
        assert_eq!(stats.time, "00:00:50");
    }

    #[test]
    fn test_header_and_progress_in_one_chunk() {
        let mut parser = ProgressParser::new();
        let stats = parser.feed(&format!("{HEADER}{HALFWAY}")).expect("signal");
        assert_eq!(stats.duration, 100);
        assert_eq!(stats.percentage, 50);
    }

    #[test]
    fn test_indeterminate_duration() {
        let mut parser = ProgressParser::new();

        let stats = parser
            .feed("  Duration: N/A, start: 0.000000, bitrate: N/A\n")
            .expect("duration signal");
        assert_eq!(stats.duration, INDETERMINATE_DURATION);
        assert_eq!(stats.percentage, 100);

        assert!(parser.feed(HALFWAY).is_none());
        assert_eq!(parser.stats().percentage, 100);
    }

    #[test]
    fn test_bare_unknown_duration() {
        let mut parser = ProgressParser::new();
        let stats = parser.feed("Duration: N/A").expect("duration signal");
        assert_eq!(stats.duration, INDETERMINATE_DURATION);
        assert_eq!(stats.percentage, 100);
    }

    #[test]
    fn test_unknown_duration_split_across_reads() {
        let mut parser = ProgressParser::new();
        assert!(parser.feed("  Duration: N").is_none());
        let stats = parser.feed("/A").expect("duration signal");
        assert_eq!(stats.duration, INDETERMINATE_DURATION);
    }

    #[test]
    fn test_markers_split_across_reads() {
        let mut parser = ProgressParser::new();

        assert!(parser.feed("noise noise  Dura").is_none());
        assert!(parser.feed("tion: 00:0").is_none());
        assert_eq!(parser.feed("1:40.00, start").map(|s| s.duration), Some(100));

        assert!(parser.feed("frame= 10 fps=25 time=00:0").is_none());
        let stats = parser.feed("0:25.00 bitrate=1k").expect("progress signal");
        assert_eq!(stats.percentage, 25);
        assert_eq!(stats.frame, 10);
    }

    #[test]
    fn test_percentage_is_monotonic() {
        let mut parser = ProgressParser::new();
        parser.feed(HEADER);

        assert!(parser.feed(HALFWAY).is_some());
        // Same or lower position does not signal
        assert!(parser.feed(HALFWAY).is_none());
        assert!(parser.feed("frame= 10 time=00:00:10.00 ").is_none());
        assert_eq!(parser.stats().percentage, 50);
        assert_eq!(parser.stats().frame, 1250);

        // Past the end is capped
        let stats = parser.feed("time=00:05:00.00 ").expect("progress signal");
        assert_eq!(stats.percentage, 100);
    }

    #[test]
    fn test_malformed_fields() {
        let mut parser = ProgressParser::new();
        assert!(parser.feed("Duration: xx:yy:zz.00, start").is_none());
        assert_eq!(parser.stats().duration, 0);

        parser.feed(HEADER);
        assert!(parser.feed("frame=N/A fps=N/A time=N/A bitrate=N/A   ").is_none());

        // Missing sub-fields default
        let stats = parser.feed("time=00:00:20.00 ").expect("progress signal");
        assert_eq!(stats.percentage, 20);
        assert_eq!(stats.frame, 0);
        assert_eq!(stats.fps, 0.0);
        assert_eq!(stats.bitrate, "");
    }

    #[test]
    fn test_buffer_bounded_before_duration() {
        let mut parser = ProgressParser::new();
        for _ in 0..100 {
            parser.feed("ffmpeg version n6.1 Copyright (c) 2000-2023 the FFmpeg developers\n");
        }
        assert!(parser.buf.len() <= PRE_DURATION_TAIL);
    }

    #[test]
    fn test_hms_to_secs() {
        assert_eq!(hms_to_secs("01:02:03"), Some(3723));
        assert_eq!(hms_to_secs("00:00"), None);
        assert_eq!(hms_to_secs("0a:00:00"), None);
    }
}
