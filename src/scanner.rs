//! This module contains the [`SuffixScanner`], a byte automaton that streams
//! the longest vocabulary match ending at every input position.
use ahash::AHashMap;

use crate::vocabulary::{TokenRef, TokenSet};

/// An opaque automaton position. Obtain the initial one from
/// [`SuffixScanner::start`] and advance it with [`SuffixScanner::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerState(u32);

struct State {
    // The longest token whose string is a suffix of this state's suffix,
    // else the literal sentinel for the suffix's last byte. Only the empty
    // root state carries no token.
    token: Option<TokenRef>,
    next: Box<[u32; 256]>,
}

/// A deterministic automaton over bytes whose states are the distinct
/// suffixes of vocabulary tokens plus the 256 length-1 literal states.
///
/// After construction the scanner does O(1) work per byte: one table lookup
/// to advance and one to read the longest match ending at the current
/// position. The transition for `(state, byte)` always leads to the longest
/// suffix of `state + byte` that is itself a state, so the match can never be
/// missed regardless of how matches overlap.
///
/// The table is built once per frozen vocabulary; mutating the [`TokenSet`]
/// afterwards invalidates any scanner built over it.
pub struct SuffixScanner {
    states: Vec<State>,
}

impl SuffixScanner {
    /// Builds the automaton for a vocabulary.
    ///
    /// States are inserted for every non-empty prefix of every token and for
    /// every byte value; transitions and longest-match tokens are then filled
    /// in breadth-first order over the suffix links.
    pub fn new(token_set: &TokenSet) -> Self {
        let mut children: Vec<AHashMap<u8, u32>> = vec![AHashMap::new()];
        let mut exact: Vec<Option<u32>> = vec![None];

        let insert = |children: &mut Vec<AHashMap<u8, u32>>,
                          exact: &mut Vec<Option<u32>>,
                          string: &[u8]|
         -> u32 {
            let mut state = 0u32;
            for &b in string {
                state = match children[state as usize].get(&b) {
                    Some(&next) => next,
                    None => {
                        let next = children.len() as u32;
                        children[state as usize].insert(b, next);
                        children.push(AHashMap::new());
                        exact.push(None);
                        next
                    }
                };
            }
            state
        };

        for token in token_set.tokens() {
            let state = insert(&mut children, &mut exact, token.string());
            exact[state as usize] = Some(token.id());
        }
        for b in 0..=255u8 {
            insert(&mut children, &mut exact, &[b]);
        }

        let nstates = children.len();
        let mut fail = vec![0u32; nstates];
        let mut states: Vec<State> = Vec::with_capacity(nstates);
        for _ in 0..nstates {
            states.push(State {
                token: None,
                next: Box::new([0; 256]),
            });
        }

        let mut queue: std::collections::VecDeque<u32> = std::collections::VecDeque::new();
        for b in 0..=255u8 {
            let s = children[0][&b];
            fail[s as usize] = 0;
            states[s as usize].token = match exact[s as usize] {
                Some(id) => Some(TokenRef::Token(id)),
                None => Some(TokenRef::Literal(b)),
            };
            queue.push_back(s);
        }
        // Root transitions: every byte has a length-1 state.
        for b in 0..=255u8 {
            states[0].next[b as usize] = children[0][&b];
        }

        // Breadth-first over the trie: a state's failure link always has a
        // smaller depth, so its transition row is complete by the time the
        // state is popped.
        while let Some(s) = queue.pop_front() {
            let su = s as usize;
            for b in 0..=255u8 {
                let fallthrough = states[fail[su] as usize].next[b as usize];
                match children[su].get(&b).copied() {
                    Some(child) => {
                        let cu = child as usize;
                        fail[cu] = fallthrough;
                        let inherited = states[fallthrough as usize].token;
                        states[cu].token = match exact[cu] {
                            Some(id) => Some(TokenRef::Token(id)),
                            None => inherited.or(Some(TokenRef::Literal(b))),
                        };
                        states[su].next[b as usize] = child;
                        queue.push_back(child);
                    }
                    None => {
                        states[su].next[b as usize] = fallthrough;
                    }
                }
            }
        }

        Self { states }
    }

    /// The initial position: the empty suffix, which carries no token.
    pub fn start(&self) -> ScannerState {
        ScannerState(0)
    }

    /// Consumes one byte, returning the next position.
    #[inline]
    pub fn step(&self, state: ScannerState, byte: u8) -> ScannerState {
        ScannerState(self.states[state.0 as usize].next[byte as usize])
    }

    /// The longest vocabulary match whose string is a suffix of the bytes
    /// consumed so far, or the literal sentinel for the last byte when the
    /// vocabulary has no match. `None` only at [`SuffixScanner::start`].
    #[inline]
    pub fn token(&self, state: ScannerState) -> Option<TokenRef> {
        self.states[state.0 as usize].token
    }

    /// Streams the automaton over `input`, yielding for every byte the token
    /// of the state reached.
    pub fn scan<I: IntoIterator<Item = u8>>(&self, input: I) -> Scan<'_, I::IntoIter> {
        Scan {
            scanner: self,
            state: self.start(),
            input: input.into_iter(),
        }
    }

    /// The number of automaton states, for diagnostics.
    pub fn nstates(&self) -> usize {
        self.states.len()
    }
}

/// Iterator returned by [`SuffixScanner::scan`].
pub struct Scan<'a, I> {
    scanner: &'a SuffixScanner,
    state: ScannerState,
    input: I,
}

impl<I: Iterator<Item = u8>> Iterator for Scan<'_, I> {
    type Item = TokenRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let byte = self.input.next()?;
        self.state = self.scanner.step(self.state, byte);
        // Non-root states always carry a token; the literal arm is the
        // correct answer for the root as well.
        Some(
            self.scanner
                .token(self.state)
                .unwrap_or(TokenRef::Literal(byte)),
        )
    }
}
