//! Substring search over the rope
//!
//! A single KMP automaton streams over the leaves in order, so matches that
//! straddle leaf boundaries are found without materializing the text.

use crate::tree::Tree;

/// Knuth-Morris-Pratt matcher for a non-empty pattern
struct Kmp<'p> {
    pattern: &'p [u8],
    /// failure[i]: length of the longest proper border of pattern[..=i]
    failure: Vec<usize>,
}

impl<'p> Kmp<'p> {
    fn new(pattern: &'p [u8]) -> Self {
        let mut failure = vec![0; pattern.len()];
        let mut k = 0;
        for i in 1..pattern.len() {
            while k > 0 && pattern[i] != pattern[k] {
                k = failure[k - 1];
            }
            if pattern[i] == pattern[k] {
                k += 1;
            }
            failure[i] = k;
        }
        Self { pattern, failure }
    }

    /// Feed one byte; true when a full match ends on it
    #[inline]
    fn step(&self, state: &mut usize, byte: u8) -> bool {
        while *state > 0 && self.pattern[*state] != byte {
            *state = self.failure[*state - 1];
        }
        if self.pattern[*state] == byte {
            *state += 1;
        }
        if *state == self.pattern.len() {
            // Fall back so overlapping matches keep streaming
            *state = self.failure[*state - 1];
            return true;
        }
        false
    }
}

impl Tree {
    /// Byte offset of the first occurrence of `pattern`
    ///
    /// An empty pattern never matches.
    pub fn find_substring(&self, pattern: &[u8]) -> Option<usize> {
        self.find_substring_from(pattern, 0)
    }

    /// First occurrence starting at or after byte `start`
    pub fn find_substring_from(&self, pattern: &[u8], start: usize) -> Option<usize> {
        if pattern.is_empty() || start > self.len() {
            return None;
        }
        let kmp = Kmp::new(pattern);
        let mut state = 0;
        let mut pos = start;
        for chunk in self.chunks_from(start) {
            for &byte in chunk {
                pos += 1;
                if kmp.step(&mut state, byte) {
                    return Some(pos - pattern.len());
                }
            }
        }
        None
    }

    /// Start offsets of every occurrence, overlapping ones included
    pub fn find_all(&self, pattern: &[u8]) -> Vec<usize> {
        let mut matches = Vec::new();
        if pattern.is_empty() {
            return matches;
        }
        let kmp = Kmp::new(pattern);
        let mut state = 0;
        let mut pos = 0;
        for chunk in self.chunks() {
            for &byte in chunk {
                pos += 1;
                if kmp.step(&mut state, byte) {
                    matches.push(pos - pattern.len());
                }
            }
        }
        tracing::debug!(pattern_len = pattern.len(), count = matches.len(), "find_all");
        matches
    }

    /// Line number of the first occurrence of `pattern`
    pub fn find_substring_line(&self, pattern: &[u8]) -> Option<usize> {
        let offset = self.find_substring(pattern)?;
        self.line_at_offset(offset)
    }
}
