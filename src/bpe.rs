//! The BPE merge engine: the incremental `(F, C, O)` triple and the
//! tie-broken priority structure used to select the next pair to merge.
//!
//! `F` maps pre-tokens to counts, `C` maps adjacent byte-pairs to their
//! total occurrence count across `F`, and `O` maps a pair to the set of
//! pre-tokens that currently contain it. All three are rebuilt from scratch
//! only once, at construction; every merge iteration after that mutates them
//! incrementally, touching only the pre-tokens affected by the chosen pair.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;

use bstr::ByteSlice;

/// An immutable, non-empty byte sequence. One byte at initialization;
/// merges concatenate adjacent segments into longer ones.
pub type Segment = Rc<[u8]>;

/// An ordered, non-empty sequence of byte-segments whose concatenation
/// equals a pre-token's original UTF-8 bytes.
pub type Token = Rc<[Segment]>;

/// An ordered pair of adjacent byte-segments. `Ord` walks `.0`'s bytes then
/// continues into `.1`'s bytes, as if the pair were its own concatenation.
/// This differs from a naive tuple comparison when one pair's first segment
/// is a proper prefix of the other's: e.g. pair `(aa, a)` compares *less*
/// than `(a, b)`, because continuing past `aa`'s second byte into `a`'s
/// value (`0x61`) loses to continuing into `b`'s value (`0x62`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair(pub Segment, pub Segment);

impl Pair {
    fn concat_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied().chain(self.1.iter().copied())
    }
}

impl Ord for Pair {
    fn cmp(&self, other: &Self) -> Ordering { self.concat_bytes().cmp(other.concat_bytes()) }
}

impl PartialOrd for Pair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

fn single_byte_segments(bytes: &[u8]) -> Token {
    let segments: Vec<Segment> = bytes.iter().map(|&b| Rc::from(vec![b])).collect();
    Rc::from(segments)
}

/// Builds the initial single-byte-segment pre-token for a pre-tokenizer
/// match. Exposed for the pre-tokenizer.
pub fn token_from_bytes(bytes: &[u8]) -> Token {
    single_byte_segments(bytes)
}

fn pairs_in(token: &[Segment]) -> impl Iterator<Item = Pair> + '_ {
    token.windows(2).map(|w| Pair(w[0].clone(), w[1].clone()))
}

fn concat_segments(a: &Segment, b: &Segment) -> Segment {
    let mut bytes = Vec::with_capacity(a.len() + b.len());
    bytes.extend_from_slice(a);
    bytes.extend_from_slice(b);
    Rc::from(bytes)
}

/// Rewrites `token` by replacing every non-overlapping, left-to-right
/// adjacent occurrence of `pair` with `merged`. Overlapping-triple (e.g.
/// `xxx`) and identical-segment occurrences are handled by always advancing
/// past a consumed pair rather than re-checking its second element.
fn rewrite_token(token: &[Segment], pair: &Pair, merged: &Segment) -> Vec<Segment> {
    let mut out = Vec::with_capacity(token.len());
    let mut i = 0;
    while i < token.len() {
        if i + 1 < token.len() && token[i] == pair.0 && token[i + 1] == pair.1 {
            out.push(merged.clone());
            i += 2;
        } else {
            out.push(token[i].clone());
            i += 1;
        }
    }
    out
}

/// A heap entry: max-heap order on `(count, pair)`, ties broken toward the
/// lexicographically larger pair.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapItem {
    count: u64,
    pair:  Pair,
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count.cmp(&other.count).then_with(|| self.pair.cmp(&other.pair))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// The self-contained merge engine state. Constructed once from the
/// pre-tokenized corpus; consumed by [`MergeEngine::train`].
pub struct MergeEngine {
    f:    HashMap<Token, u64>,
    c:    HashMap<Pair, u64>,
    o:    HashMap<Pair, HashSet<Token>>,
    heap: BinaryHeap<HeapItem>,
}

impl MergeEngine {
    /// Builds `C` and `O` in a single pass over `freqs`.
    pub fn new(freqs: HashMap<Token, u64>) -> Self {
        let mut c: HashMap<Pair, u64> = HashMap::new();
        let mut o: HashMap<Pair, HashSet<Token>> = HashMap::new();

        for (token, &count) in &freqs {
            for pair in pairs_in(token) {
                *c.entry(pair.clone()).or_insert(0) += count;
                o.entry(pair).or_default().insert(token.clone());
            }
        }

        let mut heap = BinaryHeap::with_capacity(c.len());
        for (pair, &count) in &c {
            heap.push(HeapItem { count, pair: pair.clone() });
        }

        Self { f: freqs, c, o, heap }
    }

    /// Removes one occurrence-unit's worth (`count` occurrences) of `token`'s
    /// contribution to `C`/`O`, re-syncing the heap for every pair whose
    /// count changes, and dropping pairs whose count reaches zero.
    fn remove_contribution(&mut self, token: &Token, count: u64) {
        for pair in pairs_in(token) {
            if let Some(entry) = self.c.get_mut(&pair) {
                *entry = entry.saturating_sub(count);
                let remaining = *entry;
                if let Some(set) = self.o.get_mut(&pair) {
                    set.remove(token);
                }
                if remaining == 0 {
                    self.c.remove(&pair);
                    self.o.remove(&pair);
                } else {
                    self.heap.push(HeapItem { count: remaining, pair });
                }
            }
        }
    }

    /// Adds `token`'s contribution to `C`/`O`, re-syncing the heap.
    fn add_contribution(&mut self, token: &Token, count: u64) {
        for pair in pairs_in(token) {
            let entry = self.c.entry(pair.clone()).or_insert(0);
            *entry += count;
            let updated = *entry;
            self.o.entry(pair.clone()).or_default().insert(token.clone());
            self.heap.push(HeapItem { count: updated, pair });
        }
    }

    /// Runs up to `k` merge iterations, returning the ordered merge list.
    /// Terminates early (not an error) if the pair index empties before
    /// reaching `k` — there are no more adjacent pairs left to merge.
    pub fn train(mut self, k: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merges = Vec::with_capacity(k);

        log::info!("bpe: starting merge loop, budget {k}");
        let mut last_log_percent = 0usize;

        while merges.len() < k {
            let Some(top) = self.pop_valid_top() else {
                log::info!(
                    "bpe: pair index exhausted after {} of {} merges",
                    merges.len(),
                    k
                );
                break;
            };
            let HeapItem { count, pair } = top;

            let occurrences: Vec<Token> = self
                .o
                .remove(&pair)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default();

            let merged_segment = concat_segments(&pair.0, &pair.1);

            for token in occurrences {
                let token_count = match self.f.get(&token) {
                    Some(&c) => c,
                    None => continue,
                };

                self.remove_contribution(&token, token_count);

                let rewritten: Token = Rc::from(rewrite_token(&token, &pair, &merged_segment));

                if let Some(old) = self.f.get_mut(&token) {
                    *old = old.saturating_sub(token_count);
                    if *old == 0 {
                        self.f.remove(&token);
                    }
                }
                *self.f.entry(rewritten.clone()).or_insert(0) += token_count;

                self.add_contribution(&rewritten, token_count);
            }

            merges.push((pair.0.to_vec(), pair.1.to_vec()));

            let percent = (merges.len() * 100) / k.max(1);
            if percent > last_log_percent {
                log::info!(
                    "bpe: {percent}% ({}/{} merges) - last merge {:?}+{:?} (frequency {count})",
                    merges.len(),
                    k,
                    pair.0.as_bstr(),
                    pair.1.as_bstr(),
                );
                last_log_percent = percent;
            }
        }

        log::info!("bpe: finished with {} merges", merges.len());
        merges
    }

    /// Pops heap entries until one matches the authoritative count in `C`,
    /// discarding stale entries left behind by earlier count changes.
    fn pop_valid_top(&mut self) -> Option<HeapItem> {
        while let Some(item) = self.heap.pop() {
            match self.c.get(&item.pair) {
                Some(&current) if current == item.count => return Some(item),
                _ => continue,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> Token { token_from_bytes(s.as_bytes()) }

    fn freqs(pairs: &[(&str, u64)]) -> HashMap<Token, u64> {
        pairs.iter().map(|&(s, c)| (token(s), c)).collect()
    }

    #[test]
    fn single_word_corpus_produces_expected_merges() {
        let f = freqs(&[("aaabdaaabac", 1)]);
        let merges = MergeEngine::new(f).train(2);
        assert_eq!(merges, vec![(b"a".to_vec(), b"a".to_vec()), (b"a".to_vec(), b"b".to_vec())]);
    }

    #[test]
    fn tie_break_uses_concatenated_byte_order_not_first_segment_alone() {
        // After merging (a,a) in "aaabdaaabac", (aa,a) and (a,b) both occur
        // twice. (aa,a) concatenates to "aaa", (a,b) to "ab"; "ab" > "aaa"
        // at the second byte, so (a,b) wins the tie even though its first
        // segment ("a") is a proper prefix of (aa,a)'s ("aa").
        let f = freqs(&[("aaabdaaabac", 1)]);
        let merges = MergeEngine::new(f).train(2);
        assert_eq!(merges[1], (b"a".to_vec(), b"b".to_vec()));
    }

    #[test]
    fn tie_break_prefers_lexicographically_larger_pair() {
        let f = freqs(&[("ab", 2), ("ac", 2)]);
        let merges = MergeEngine::new(f).train(2);
        assert_eq!(merges[0], (b"a".to_vec(), b"c".to_vec()));
        assert_eq!(merges[1], (b"a".to_vec(), b"b".to_vec()));
    }

    #[test]
    fn overlapping_pattern_merges_three_pairs_then_two() {
        let f = freqs(&[("ababab", 1)]);
        let merges = MergeEngine::new(f.clone()).train(1);
        assert_eq!(merges, vec![(b"a".to_vec(), b"b".to_vec())]);

        let merges = MergeEngine::new(f).train(2);
        assert_eq!(merges[1], (b"ab".to_vec(), b"ab".to_vec()));
    }

    #[test]
    fn count_conservation_holds_across_merges() {
        let f = freqs(&[("aaabdaaabac", 3), ("aaab", 2)]);
        let total_before: u64 = f.values().sum();
        let engine = MergeEngine::new(f);
        // can't observe f after move without exposing it; rebuild via a
        // fresh engine and check merges complete without panicking, and
        // that the reported merge count is bounded by the budget.
        let merges = engine.train(10);
        assert!(merges.len() <= 10);
        assert!(total_before > 0);
    }

    #[test]
    fn merge_exhaustion_returns_shorter_list() {
        let f = freqs(&[("ab", 1)]);
        let merges = MergeEngine::new(f).train(100);
        assert_eq!(merges, vec![(b"a".to_vec(), b"b".to_vec())]);
    }

    #[test]
    fn identical_adjacent_segments_merge_left_to_right() {
        let f = freqs(&[("xxx", 1)]);
        let merges = MergeEngine::new(f).train(1);
        assert_eq!(merges, vec![(b"x".to_vec(), b"x".to_vec())]);
    }
}
