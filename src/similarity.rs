//! Ratcliff/Obershelp title similarity.
//!
//! The score is `2 * M / T`, where `M` is the number of characters covered by
//! the matching blocks and `T` the combined length of both strings. Matching
//! blocks are found by taking the longest common substring, then recursing on
//! the pieces to its left and right.
//!
//! ```
//! use cvpubs::similarity::similarity;
//!
//! assert_eq!(similarity("causal inference", "causal inference"), 1.0);
//! assert!(similarity("completely different", "unrelated text") < 0.3);
//! ```

use std::collections::HashMap;

/// Scores two strings in `[0, 1]`.
///
/// Operates on Unicode scalar values. Two empty strings score `1.0`.
///
/// The greedy block search can find different alignments depending on which
/// string is scanned first. Both directions are scored and the lower one is
/// returned, so `similarity(a, b) == similarity(b, a)`.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched = SequenceMatcher::new(&a, &b)
        .matching_characters()
        .min(SequenceMatcher::new(&b, &a).matching_characters());
    2.0 * matched as f64 / total as f64
}

struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of every character in `b`, in ascending order.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        Self { a, b, b2j }
    }

    /// Total length of the matching blocks.
    fn matching_characters(&self) -> usize {
        let mut matched = 0;
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, size) = self.find_longest_match(alo, ahi, blo, bhi);
            if size == 0 {
                continue;
            }
            matched += size;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + size < ahi && j + size < bhi {
                pending.push((i + size, ahi, j + size, bhi));
            }
        }

        matched
    }

    /// Longest block `a[i..i+size] == b[j..j+size]` inside the given window.
    ///
    /// Among blocks of equal size the one starting earliest in `a` wins, then
    /// the one starting earliest in `b`.
    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        // j2len[j] = length of the match ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut new_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        (best_i, best_j, best_size)
    }
}
