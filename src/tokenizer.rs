//! This module contains the tokenizers: the minimum-cost [`OptimalTokenizer`]
//! and the [`GreedyTokenizer`]/[`ByteTokenizer`] references.
use std::collections::VecDeque;

use ahash::AHashMap;
use tinyvec::ArrayVec;

use crate::scanner::{ScannerState, SuffixScanner};
use crate::source::ChunkProvider;
use crate::stats::TokenStats;
use crate::vocabulary::{TokenRef, TokenSet};

const POWERS2: [u8; 8] = [128, 64, 32, 16, 8, 4, 2, 1];

/// Fallback token ids resolved once per frozen vocabulary. Hex wins when a
/// set carries both fallbacks.
#[derive(Debug, Clone, Copy)]
enum FallbackPlan {
    Hex { marker: u32, digits: [u32; 16] },
    Bits { bit0: u32, bit1: u32 },
}

impl FallbackPlan {
    fn new(token_set: &TokenSet) -> Self {
        if token_set.has_hex() {
            let mut digits = [0u32; 16];
            for (value, digit) in digits.iter_mut().enumerate() {
                *digit = token_set.hex_digit(value as u8).unwrap();
            }
            FallbackPlan::Hex {
                marker: token_set.hex_marker().unwrap(),
                digits,
            }
        } else {
            assert!(
                token_set.has_bits(),
                "token set has neither a bits nor a hex fallback"
            );
            FallbackPlan::Bits {
                bit0: token_set.bit0().unwrap(),
                bit1: token_set.bit1().unwrap(),
            }
        }
    }

    fn literal_cost(&self) -> u64 {
        match self {
            FallbackPlan::Hex { .. } => 3,
            FallbackPlan::Bits { .. } => 8,
        }
    }

    // The expansion in reverse order, so popping from the end yields the
    // emission order.
    fn expansion_rev(&self, byte: u8) -> ArrayVec<[u32; 8]> {
        let mut out = ArrayVec::new();
        match *self {
            FallbackPlan::Hex { marker, digits } => {
                out.push(digits[(byte & 0xF) as usize]);
                out.push(digits[(byte >> 4) as usize]);
                out.push(marker);
            }
            FallbackPlan::Bits { bit0, bit1 } => {
                for &digit in POWERS2.iter().rev() {
                    out.push(if byte & digit != 0 { bit1 } else { bit0 });
                }
            }
        }
        out
    }
}

/// One dynamic-programming window entry: the cheapest encoding of the input
/// up to this position, the token that ends it, and the first token the
/// encoding picks after the window origin.
#[derive(Debug, Clone, Copy)]
struct DpState {
    cost: u64,
    last: TokenRef,
    last_len: u32,
    first: TokenRef,
    first_len: u32,
}

/// The minimum-symbol-count tokenizer.
///
/// Over any byte stream, [`OptimalTokenizer::tokenize`] emits the token id
/// sequence of minimum total length, where a vocabulary token counts 1 and a
/// byte with no match counts its fallback expansion (3 hex tokens or 8 bit
/// tokens). The dynamic program runs over a sliding window bounded by the
/// longest token's length, so arbitrarily long streams tokenize in constant
/// memory.
///
/// Construction freezes the vocabulary: the suffix links are computed, the
/// scanner table is built once, and the set stays borrowed for the
/// tokenizer's lifetime.
///
/// # Panics
///
/// Construction panics when the set has neither a bits nor a hex fallback,
/// since no legal encoding would exist for unmatched bytes.
pub struct OptimalTokenizer<'a> {
    token_set: &'a TokenSet,
    scanner: SuffixScanner,
    plan: FallbackPlan,
    max_len: usize,
}

impl<'a> OptimalTokenizer<'a> {
    /// Freezes `token_set` and builds the tokenizer over it.
    pub fn new(token_set: &'a mut TokenSet) -> Self {
        token_set.compute_suffix_tokens();
        let token_set: &'a TokenSet = token_set;
        let plan = FallbackPlan::new(token_set);
        Self {
            scanner: SuffixScanner::new(token_set),
            plan,
            max_len: token_set.max_token_len(),
            token_set,
        }
    }

    /// The frozen vocabulary.
    pub fn token_set(&self) -> &TokenSet {
        self.token_set
    }

    /// The cost of one literal under this vocabulary's fallback.
    pub fn literal_cost(&self) -> u64 {
        self.plan.literal_cost()
    }

    /// Streams the minimum-cost tokenization of `input` as expanded token
    /// ids: literals appear as their fallback token sequence.
    pub fn tokenize<I: IntoIterator<Item = u8>>(&self, input: I) -> Tokenize<'_, 'a, I::IntoIter> {
        Tokenize {
            inner: self.tokenize_refs(input),
            pending: ArrayVec::new(),
        }
    }

    /// Streams the minimum-cost tokenization before fallback expansion:
    /// vocabulary tokens by id, unmatched bytes as literal sentinels.
    pub fn tokenize_refs<I: IntoIterator<Item = u8>>(
        &self,
        input: I,
    ) -> TokenizeRefs<'_, 'a, I::IntoIter> {
        TokenizeRefs {
            tokenizer: self,
            input: input.into_iter(),
            state: self.scanner.start(),
            window: VecDeque::new(),
            out: VecDeque::new(),
            origin_cost: 0,
            stable_run: 0,
            done: false,
        }
    }

    /// Tokenizes one chunk, accumulating counts and scanned bytes into
    /// `stats`.
    pub fn tokenize_and_count(&self, chunk: &[u8], stats: &mut TokenStats) {
        stats.count_bytes(chunk.len() as u64);
        for id in self.tokenize(chunk.iter().copied()) {
            stats.count_token(id);
        }
    }

    /// Tokenizes every chunk the provider yields and returns the collected
    /// statistics.
    pub fn tokenize_chunks(&self, data: &ChunkProvider) -> TokenStats {
        let mut stats = TokenStats::new(self.token_set.ntokens());
        for chunk in data.chunks() {
            self.tokenize_and_count(&chunk, &mut stats);
        }
        stats
    }

    fn ref_cost(&self, r: TokenRef) -> u64 {
        match r {
            TokenRef::Token(_) => 1,
            TokenRef::Literal(_) => self.plan.literal_cost(),
        }
    }
}

/// Iterator returned by [`OptimalTokenizer::tokenize_refs`].
pub struct TokenizeRefs<'t, 'v, I> {
    tokenizer: &'t OptimalTokenizer<'v>,
    input: I,
    state: ScannerState,
    // Entries for every position after the window origin; the origin itself
    // is represented by `origin_cost`.
    window: VecDeque<DpState>,
    out: VecDeque<TokenRef>,
    origin_cost: u64,
    // How many trailing window entries agree on their first token.
    stable_run: usize,
    done: bool,
}

impl<I: Iterator<Item = u8>> TokenizeRefs<'_, '_, I> {
    fn advance_byte(&mut self, byte: u8) {
        let tk = self.tokenizer;
        self.state = tk.scanner.step(self.state, byte);
        let longest = tk
            .scanner
            .token(self.state)
            .unwrap_or(TokenRef::Literal(byte));

        // Candidates ending at this position are the scanner's longest match
        // and its suffix-token chain; everything shorter than the window is
        // reachable, everything longer would cross the already-emitted
        // prefix and is skipped.
        let avail = self.window.len() + 1;
        let mut best: Option<DpState> = None;
        let mut cand = Some(longest);
        while let Some(c) = cand {
            let (len, step_cost, next) = match c {
                TokenRef::Token(id) => {
                    let token = tk.token_set.token(id);
                    (token.len(), 1, token.suffix_token())
                }
                TokenRef::Literal(_) => (1, tk.plan.literal_cost(), None),
            };
            cand = next;
            if len > avail {
                continue;
            }
            let (base, first, first_len) = if len == avail {
                (self.origin_cost, c, len as u32)
            } else {
                let prev = &self.window[self.window.len() - len];
                (prev.cost, prev.first, prev.first_len)
            };
            let cost = base + step_cost;
            // Strict comparison keeps the earliest candidate on ties, which
            // is the longest match in scanner order.
            if best.map_or(true, |b| cost < b.cost) {
                best = Some(DpState {
                    cost,
                    last: c,
                    last_len: len as u32,
                    first,
                    first_len,
                });
            }
        }
        let state = best.expect("the suffix chain always ends in a length-1 candidate");

        if self.window.back().map_or(false, |prev| prev.first == state.first) {
            self.stable_run += 1;
        } else {
            self.stable_run = 1;
        }
        self.window.push_back(state);

        // Once the trailing `max_len` positions agree on the first token, no
        // future byte can change it: every later position reaches back at
        // most `max_len` bytes, into states that already agree.
        while self.stable_run >= tk.max_len && self.window.len() >= tk.max_len {
            let back = *self.window.back().unwrap();
            self.emit(back.first, back.first_len as usize);
        }
    }

    fn emit(&mut self, first: TokenRef, first_len: usize) {
        self.out.push_back(first);
        self.origin_cost += self.tokenizer.ref_cost(first);
        for _ in 0..first_len {
            self.window.pop_front();
        }
        self.recompute_firsts();
    }

    // After the origin advances, every remaining entry's first pointer is
    // re-derived from its own last token and the entries before it.
    fn recompute_firsts(&mut self) {
        for k in 0..self.window.len() {
            let len = self.window[k].last_len as usize;
            if len == k + 1 {
                let state = &mut self.window[k];
                state.first = state.last;
                state.first_len = state.last_len;
            } else if len <= k {
                let (first, first_len) = {
                    let prev = &self.window[k - len];
                    (prev.first, prev.first_len)
                };
                let state = &mut self.window[k];
                state.first = first;
                state.first_len = first_len;
            }
            // len > k + 1: the entry's path crosses the new origin. It can
            // never be reached again and its first pointer is never read.
        }
        self.stable_run = match self.window.back() {
            Some(back) => {
                let first = back.first;
                self.window
                    .iter()
                    .rev()
                    .take_while(|s| s.first == first)
                    .count()
            }
            None => 0,
        };
    }

    fn drain(&mut self) {
        // The back entry holds the optimal encoding of the whole remaining
        // input; emitting its first token and advancing repeats until the
        // window is empty.
        while let Some(&back) = self.window.back() {
            self.emit(back.first, back.first_len as usize);
        }
    }
}

impl<I: Iterator<Item = u8>> Iterator for TokenizeRefs<'_, '_, I> {
    type Item = TokenRef;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.out.pop_front() {
                return Some(r);
            }
            if self.done {
                return None;
            }
            match self.input.next() {
                Some(byte) => self.advance_byte(byte),
                None => {
                    self.done = true;
                    self.drain();
                }
            }
        }
    }
}

/// Iterator returned by [`OptimalTokenizer::tokenize`].
pub struct Tokenize<'t, 'v, I> {
    inner: TokenizeRefs<'t, 'v, I>,
    pending: ArrayVec<[u32; 8]>,
}

impl<I: Iterator<Item = u8>> Iterator for Tokenize<'_, '_, I> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.pending.pop() {
                return Some(id);
            }
            match self.inner.next()? {
                TokenRef::Token(id) => return Some(id),
                TokenRef::Literal(byte) => {
                    self.pending = self.inner.tokenizer.plan.expansion_rev(byte);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PrefixEntry {
    Token(u32),
    Partial,
}

/// The longest-prefix reference tokenizer.
///
/// At every position it commits to the longest token that is a prefix of the
/// remaining bytes, or to the fallback expansion of one byte when nothing
/// matches. Its output is legal but generally longer than the optimal
/// tokenizer's; tests use it as a baseline.
pub struct GreedyTokenizer<'a> {
    token_set: &'a TokenSet,
    plan: FallbackPlan,
    prefixes: AHashMap<Box<[u8]>, PrefixEntry>,
}

impl<'a> GreedyTokenizer<'a> {
    /// Builds the prefix table for a vocabulary.
    ///
    /// # Panics
    ///
    /// Panics when the set has neither fallback.
    pub fn new(token_set: &'a TokenSet) -> Self {
        let plan = FallbackPlan::new(token_set);
        let mut prefixes = AHashMap::new();
        for token in token_set.tokens() {
            for end in 1..token.len() {
                prefixes
                    .entry(token.string()[..end].into())
                    .or_insert(PrefixEntry::Partial);
            }
        }
        for token in token_set.tokens() {
            prefixes.insert(token.string().into(), PrefixEntry::Token(token.id()));
        }
        Self {
            token_set,
            plan,
            prefixes,
        }
    }

    /// The vocabulary the prefix table was built for.
    pub fn token_set(&self) -> &TokenSet {
        self.token_set
    }

    /// Greedily tokenizes a byte slice into expanded token ids.
    pub fn tokenize<'d>(&self, data: &'d [u8]) -> GreedyTokenize<'_, 'a, 'd> {
        GreedyTokenize {
            tokenizer: self,
            data,
            pos: 0,
            pending: ArrayVec::new(),
        }
    }
}

/// Iterator returned by [`GreedyTokenizer::tokenize`].
pub struct GreedyTokenize<'t, 'v, 'd> {
    tokenizer: &'t GreedyTokenizer<'v>,
    data: &'d [u8],
    pos: usize,
    pending: ArrayVec<[u32; 8]>,
}

impl Iterator for GreedyTokenize<'_, '_, '_> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(id) = self.pending.pop() {
            return Some(id);
        }
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let mut longest: Option<(u32, usize)> = None;
        for len in 1..=rest.len() {
            match self.tokenizer.prefixes.get(&rest[..len]) {
                Some(PrefixEntry::Token(id)) => longest = Some((*id, len)),
                Some(PrefixEntry::Partial) => {}
                None => break,
            }
        }
        match longest {
            Some((id, len)) => {
                self.pos += len;
                Some(id)
            }
            None => {
                self.pending = self.tokenizer.plan.expansion_rev(rest[0]);
                self.pos += 1;
                self.pending.pop()
            }
        }
    }
}

/// The single-byte reference tokenizer: each byte becomes its single-byte
/// token when the vocabulary has one, else its fallback expansion.
pub struct ByteTokenizer<'a> {
    token_set: &'a TokenSet,
    plan: FallbackPlan,
}

impl<'a> ByteTokenizer<'a> {
    /// Builds the tokenizer.
    ///
    /// # Panics
    ///
    /// Panics when the set has neither fallback.
    pub fn new(token_set: &'a TokenSet) -> Self {
        Self {
            plan: FallbackPlan::new(token_set),
            token_set,
        }
    }

    /// Tokenizes a byte stream into expanded token ids.
    pub fn tokenize<I: IntoIterator<Item = u8>>(
        &self,
        input: I,
    ) -> ByteTokenize<'_, 'a, I::IntoIter> {
        ByteTokenize {
            tokenizer: self,
            input: input.into_iter(),
            pending: ArrayVec::new(),
        }
    }
}

/// Iterator returned by [`ByteTokenizer::tokenize`].
pub struct ByteTokenize<'t, 'v, I> {
    tokenizer: &'t ByteTokenizer<'v>,
    input: I,
    pending: ArrayVec<[u32; 8]>,
}

impl<I: Iterator<Item = u8>> Iterator for ByteTokenize<'_, '_, I> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(id) = self.pending.pop() {
            return Some(id);
        }
        let byte = self.input.next()?;
        match self.tokenizer.token_set.byte_token(byte) {
            Some(token) => Some(token.id()),
            None => {
                self.pending = self.tokenizer.plan.expansion_rev(byte);
                self.pending.pop()
            }
        }
    }
}
