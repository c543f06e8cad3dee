//! LRC format parser
//!
//! Each line carries zero or more leading time tags followed by its text:
//! [mm:ss.xx] Lyrics line here
//! [mm:ss.xx][mm:ss.xx] Repeated chorus
//!
//! Lines without a time tag (including `[ti:...]` style ID tags) and lines
//! with no text after the tags are dropped.

use super::timeline::LyricSegment;

/// Parse LRC text into contiguous segments sorted by start time.
///
/// Every segment ends where the next one starts; the last one ends at
/// `fallback_duration`. Returns an empty vector when nothing parses.
pub fn parse(raw: &str, fallback_duration: f64) -> Vec<LyricSegment> {
    let mut starts: Vec<(f64, String)> = Vec::new();

    for line in raw.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        let Some((stamps, text)) = parse_timed_line(line) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        for start in stamps {
            starts.push((start, text.to_string()));
        }
    }

    // Stable: lines sharing a timestamp keep file order.
    starts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut segments = Vec::with_capacity(starts.len());
    for i in 0..starts.len() {
        let end = starts.get(i + 1).map_or(fallback_duration, |next| next.0);
        let (start, text) = &starts[i];
        segments.push(LyricSegment {
            start: *start,
            end,
            text: text.clone(),
        });
    }
    segments
}

/// Split `[00:12.34][00:15.00]text` into its timestamps and trailing text.
fn parse_timed_line(line: &str) -> Option<(Vec<f64>, &str)> {
    let mut stamps = Vec::new();
    let mut rest = line;

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        let Some(seconds) = parse_timestamp(&inner[..end]) else {
            break;
        };
        stamps.push(seconds);
        rest = inner[end + 1..].trim_start();
    }

    if stamps.is_empty() {
        return None;
    }
    Some((stamps, rest.trim()))
}

/// Parse `mm:ss`, `mm:ss.f`, `mm:ss.ff` or `mm:ss.fff` into seconds.
///
/// The fraction is right-padded to milliseconds, so `.39` is 390 ms. The sum
/// is built in integer milliseconds and divided once to keep `65.39` exact.
fn parse_timestamp(s: &str) -> Option<f64> {
    let (min, rest) = s.split_once(':')?;
    let (sec, frac) = match rest.split_once('.') {
        Some((sec, frac)) => (sec, Some(frac)),
        None => (rest, None),
    };

    if !is_digits(min) || !is_digits(sec) || sec.len() != 2 {
        return None;
    }
    let min: u64 = min.parse().ok()?;
    let sec: u64 = sec.parse().ok()?;

    let ms: u64 = match frac {
        None => 0,
        Some(f) if is_digits(f) && f.len() <= 3 => format!("{f:0<3}").parse().ok()?,
        Some(_) => return None,
    };

    let total_ms = min.checked_mul(60_000)?.checked_add(sec * 1000 + ms)?;
    Some(total_ms as f64 / 1000.0)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
