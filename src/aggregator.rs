use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::types::StackFrame;

/// Separator between symbol names in a signature.
pub const SEPARATOR: &str = "; ";

/// Canonical key of a stack: symbol names root first, joined by `SEPARATOR`.
///
/// Addresses and offsets are ignored, so distinct call sites in functions with the same name
/// collapse into one signature.
pub fn signature(frames: &[StackFrame]) -> String {
    let mut s = String::with_capacity(frames.iter().map(|f| f.symbol.len() + 2).sum());
    for (i, frame) in frames.iter().rev().enumerate() {
        if i != 0 {
            s.push_str(SEPARATOR);
        }
        s.push_str(&frame.symbol);
    }
    s
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    /// Symbol names, root first.
    frames: Vec<String>,
    count: u64,
}

/// Counts of each distinct signature. Carries no ordering.
///
/// Each entry keeps the symbol list it was built from. A symbol name may itself contain
/// `SEPARATOR`, so the joined signature can't be split back apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    entries: HashMap<String, Entry>,
}

impl Histogram {
    pub fn get(&self, signature: &str) -> Option<u64> {
        self.entries.get(signature).map(|e| e.count)
    }

    /// Number of distinct signatures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stacks recorded.
    pub fn total(&self) -> u64 {
        self.entries.values().map(|e| e.count).sum()
    }

    /// `(signature, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(sig, e)| (sig.as_str(), e.count))
    }

    /// `(symbols root first, count)` pairs.
    pub fn stacks(&self) -> impl Iterator<Item = (&[String], u64)> {
        self.entries.values().map(|e| (e.frames.as_slice(), e.count))
    }

    fn add(&mut self, signature: String, frames: Vec<String>, count: u64) {
        self.entries
            .entry(signature)
            .or_insert(Entry { frames, count: 0 })
            .count += count;
    }
}

/// Serializes as a flat `{signature: count}` object.
impl Serialize for Histogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[derive(Debug, Default)]
pub struct TraceAggregator {
    histogram: Histogram,
}

impl TraceAggregator {
    pub fn new() -> Self {
        TraceAggregator::default()
    }

    pub fn record(&mut self, frames: &[StackFrame]) {
        let symbols = frames.iter().rev().map(|f| f.symbol.clone()).collect();
        self.histogram.add(signature(frames), symbols, 1);
    }

    pub fn snapshot(&self) -> Histogram {
        self.histogram.clone()
    }

    /// Hands over the histogram without copying it.
    pub fn into_histogram(self) -> Histogram {
        self.histogram
    }
}

#[cfg(test)]
impl Histogram {
    /// Builds a histogram from signatures whose symbols don't contain `SEPARATOR`.
    pub(crate) fn from_pairs(pairs: &[(&str, u64)]) -> Histogram {
        let mut hist = Histogram::default();
        for (sig, count) in pairs {
            let frames = if sig.is_empty() {
                Vec::new()
            } else {
                sig.split(SEPARATOR).map(str::to_string).collect()
            };
            hist.add(sig.to_string(), frames, *count);
        }
        hist
    }
}
