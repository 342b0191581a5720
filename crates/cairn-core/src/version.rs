//! Version parsing, comparison, and range matching.
//!
//! Recipe versions are dot-separated identifiers compared segment-wise:
//! numeric segments compare as numbers (so `6.9` < `6.12`), non-numeric
//! segments compare lexicographically, and a numeric segment outranks a
//! textual one. Trailing zero segments are insignificant (`1.0` == `1.0.0`).
//!
//! Ranges use the recipe syntax: `:X` means "≤ X", `X:` means "≥ X",
//! `X:Y` is the inclusive interval, a bare version is an exact match, and
//! a lone `:` (or the empty string) matches anything.

use std::cmp::Ordering;
use std::fmt;

/// A parsed version with comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Numeric(u64),
    Text(String),
}

impl Version {
    pub fn parse(version: &str) -> Self {
        Self {
            original: version.to_string(),
            segments: parse_segments(version),
        }
    }

    /// The version string exactly as declared.
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let ord = compare_segments(self.segments.get(i), other.segments.get(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(s), None) => compare_segment_to_empty(s),
        (None, Some(s)) => compare_segment_to_empty(s).reverse(),
        (Some(a), Some(b)) => compare_two_segments(a, b),
    }
}

fn compare_segment_to_empty(seg: &Segment) -> Ordering {
    match seg {
        Segment::Numeric(0) => Ordering::Equal,
        Segment::Numeric(_) => Ordering::Greater,
        Segment::Text(s) if s.is_empty() => Ordering::Equal,
        // A textual suffix (`1.0-rc1`) sorts before the plain release.
        Segment::Text(_) => Ordering::Less,
    }
}

fn compare_two_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Numeric(a), Segment::Numeric(b)) => a.cmp(b),
        (Segment::Numeric(_), Segment::Text(_)) => Ordering::Greater,
        (Segment::Text(_), Segment::Numeric(_)) => Ordering::Less,
        (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
    }
}

fn parse_segments(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for ch in version.chars() {
        if ch == '.' || ch == '-' || ch == '_' {
            if !current.is_empty() {
                segments.push(classify(&current));
                current.clear();
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        segments.push(classify(&current));
    }

    segments
}

fn classify(token: &str) -> Segment {
    match token.parse::<u64>() {
        Ok(n) => Segment::Numeric(n),
        Err(_) => Segment::Text(token.to_string()),
    }
}

/// A version range with inclusive bounds on both ends.
#[derive(Debug, Clone, Default)]
pub struct VersionRange {
    pub lower: Option<Version>,
    pub upper: Option<Version>,
}

impl VersionRange {
    /// The range that matches every version.
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a range expression. Returns `None` for unparsable input
    /// (more than one `:`, or an empty bare version); callers map that
    /// to the error kind appropriate for their context.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        if s.is_empty() || s == ":" {
            return Some(Self::any());
        }
        let mut parts = s.split(':');
        let first = parts.next()?;
        match parts.next() {
            None => {
                // Bare version: exact match.
                let v = Version::parse(first);
                Some(Self {
                    lower: Some(v.clone()),
                    upper: Some(v),
                })
            }
            Some(second) => {
                if parts.next().is_some() {
                    return None;
                }
                Some(Self {
                    lower: (!first.is_empty()).then(|| Version::parse(first)),
                    upper: (!second.is_empty()).then(|| Version::parse(second)),
                })
            }
        }
    }

    /// Check whether a version falls inside this range.
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(ref lower) = self.lower {
            if version < lower {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            if version > upper {
                return false;
            }
        }
        true
    }

    pub fn is_any(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// The intersection of two ranges. May contain no version at all;
    /// selection against an empty intersection simply finds no candidate.
    pub fn intersect(&self, other: &Self) -> Self {
        let lower = match (&self.lower, &other.lower) {
            (Some(a), Some(b)) => Some(if a >= b { a.clone() } else { b.clone() }),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        let upper = match (&self.upper, &other.upper) {
            (Some(a), Some(b)) => Some(if a <= b { a.clone() } else { b.clone() }),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        Self { lower, upper }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (None, None) => f.write_str(":"),
            (Some(l), Some(u)) if l == u => write!(f, "{l}"),
            (Some(l), Some(u)) => write!(f, "{l}:{u}"),
            (Some(l), None) => write!(f, "{l}:"),
            (None, Some(u)) => write!(f, ":{u}"),
        }
    }
}
