//! Time-indexed lyric lines.

/// One lyric line active over `[start, end)` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Ordered, contiguous segments for one song. Empty means "no lyrics".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTimeline {
    segments: Vec<LyricSegment>,
}

impl LyricTimeline {
    /// Build from parsed LRC text; see [`super::parser::parse`].
    pub fn from_lrc(raw: &str, duration: f64) -> Self {
        Self {
            segments: super::parser::parse(raw, duration),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[LyricSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(|s| s.text.as_str())
    }

    /// Stretch the last segment to the track duration once it is known.
    pub fn set_duration(&mut self, duration: f64) {
        if let Some(last) = self.segments.last_mut() {
            last.end = duration;
        }
    }

    pub fn active_index(&self, time: f64, previous: Option<usize>) -> Option<usize> {
        active_index(&self.segments, time, previous)
    }
}

/// Index of the segment containing `time`.
///
/// Past the last segment's start the last line is held. Before the first
/// start, or for an empty timeline, returns `None`. `previous` is only a
/// hint checked first; the result never depends on it.
pub fn active_index(segments: &[LyricSegment], time: f64, previous: Option<usize>) -> Option<usize> {
    let last = segments.len().checked_sub(1)?;

    let contains = |i: usize| {
        segments
            .get(i)
            .is_some_and(|s| time >= s.start && time < s.end)
    };

    // Playback mostly stays on the same line or moves to the next one.
    if let Some(prev) = previous {
        if contains(prev) {
            return Some(prev);
        }
        let next = prev.saturating_add(1);
        if contains(next) {
            return Some(next);
        }
    }

    if let Some(i) = (0..segments.len()).find(|&i| contains(i)) {
        return Some(i);
    }

    if time >= segments[last].start {
        return Some(last);
    }
    None
}
