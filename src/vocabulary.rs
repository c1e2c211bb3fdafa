//! This module contains the [`TokenSet`] struct, which represents the trainable
//! vocabulary, and the [`Token`] records it is made of.
use ahash::AHashMap;
use nonmax::NonMaxU32;

use crate::utils;

/// Byte value reserved for the hex-fallback marker token.
pub const HEX_MARKER_VALUE: u8 = 16;
/// Byte value reserved for the zero bit of the bits fallback.
pub const BIT0_VALUE: u8 = 17;
/// Byte value reserved for the one bit of the bits fallback.
pub const BIT1_VALUE: u8 = 18;

/// A reference to an emittable symbol: a vocabulary token by id, or the
/// literal sentinel standing for "no vocabulary match at this byte".
///
/// Literal sentinels are not members of [`TokenSet::tokens`]; they only exist
/// as scanner and tokenizer outputs and expand to fallback tokens when
/// emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenRef {
    /// A vocabulary token, identified by its current id in the set.
    Token(u32),
    /// The literal sentinel for one byte value.
    Literal(u8),
}

impl TokenRef {
    /// Returns true for the literal sentinel variant.
    pub fn is_literal(&self) -> bool {
        matches!(self, TokenRef::Literal(_))
    }
}

/// An immutable vocabulary entry.
///
/// Token equality is by identity within a set: the id doubles as the index
/// into [`TokenSet::tokens`]. The cached suffix link is recomputed by
/// [`TokenSet::compute_suffix_tokens`] every time a tokenizer is built, so a
/// `None` here only means the set has been mutated since the last freeze.
#[derive(Debug, Clone)]
pub struct Token {
    id: u32,
    string: Box<[u8]>,
    value: Option<u8>,
    mandatory: bool,
    // True when the token was inserted through `add_byte`, which is the only
    // path that may claim the named fallback slots (hex marker, bits, digits).
    named: bool,
    suffix: Option<TokenRef>,
}

impl Token {
    /// The token's id, equal to its index in the owning set.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The token's byte string. Never empty.
    pub fn string(&self) -> &[u8] {
        &self.string
    }

    /// The byte value for single-byte tokens.
    pub fn value(&self) -> Option<u8> {
        self.value
    }

    /// The token length in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.string.len()
    }

    /// True when the token belongs to the fallback alphabet and must not be
    /// removed by training.
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// The longest other token that is a proper suffix of this one, else the
    /// literal sentinel for the last byte. `None` until
    /// [`TokenSet::compute_suffix_tokens`] has run (and for 1-byte tokens).
    pub fn suffix_token(&self) -> Option<TokenRef> {
        self.suffix
    }
}

/// The ordered token vocabulary under training.
///
/// The set is mutable while a vocabulary is being searched; constructing a
/// tokenizer over it freezes it for the tokenizer's lifetime (the constructor
/// takes `&mut TokenSet` and holds the borrow). Ids always stay compact:
/// `tokens[i].id() == i`, and removals renumber the tail.
#[derive(Debug, Clone)]
pub struct TokenSet {
    tokens: Vec<Token>,
    by_string: AHashMap<Box<[u8]>, u32>,
    byte_by_value: [Option<NonMaxU32>; 256],
    hex_by_value: [Option<NonMaxU32>; 16],
    hex_marker: Option<NonMaxU32>,
    bit0: Option<NonMaxU32>,
    bit1: Option<NonMaxU32>,
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSet {
    /// Creates an empty set with no fallback alphabet.
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            by_string: AHashMap::new(),
            byte_by_value: [None; 256],
            hex_by_value: [None; 16],
            hex_marker: None,
            bit0: None,
            bit1: None,
        }
    }

    /// The number of tokens in the set.
    pub fn ntokens(&self) -> usize {
        self.tokens.len()
    }

    /// True when the set contains no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The tokens in id order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Retrieves a token by id.
    ///
    /// # Panics
    ///
    /// Panics if the id is out of range; ids are only valid between
    /// mutations.
    pub fn token(&self, id: u32) -> &Token {
        &self.tokens[id as usize]
    }

    /// Looks a token up by its byte string.
    pub fn get(&self, string: &[u8]) -> Option<&Token> {
        self.by_string
            .get(string)
            .map(|&id| &self.tokens[id as usize])
    }

    /// Returns true when `string` is a token of the set.
    pub fn contains(&self, string: &[u8]) -> bool {
        self.by_string.contains_key(string)
    }

    /// The single-byte token for `value`, if present.
    pub fn byte_token(&self, value: u8) -> Option<&Token> {
        self.byte_by_value[value as usize].map(|id| &self.tokens[id.get() as usize])
    }

    /// The id of the hex marker token, if the set carries one.
    pub fn hex_marker(&self) -> Option<u32> {
        self.hex_marker.map(|v| v.get())
    }

    /// The id of the hex digit token for `digit` in `0..16`, if present.
    pub fn hex_digit(&self, digit: u8) -> Option<u32> {
        self.hex_by_value[digit as usize].map(|v| v.get())
    }

    /// The id of the zero-bit token, if present.
    pub fn bit0(&self) -> Option<u32> {
        self.bit0.map(|v| v.get())
    }

    /// The id of the one-bit token, if present.
    pub fn bit1(&self) -> Option<u32> {
        self.bit1.map(|v| v.get())
    }

    /// True when the set can fall back to the two bit tokens.
    pub fn has_bits(&self) -> bool {
        self.bit0.is_some() && self.bit1.is_some()
    }

    /// True when the set can fall back to the hex marker plus sixteen digits.
    pub fn has_hex(&self) -> bool {
        self.hex_marker.is_some() && self.hex_by_value.iter().all(Option::is_some)
    }

    /// The number of output tokens a literal expands to: 3 for the hex
    /// fallback, 8 for the bits fallback. Hex wins when a set carries both.
    ///
    /// # Panics
    ///
    /// Panics if the set has neither fallback; tokenizing such a set cannot
    /// produce a legal encoding.
    pub fn literal_cost(&self) -> u64 {
        if self.has_hex() {
            3
        } else {
            assert!(
                self.has_bits(),
                "token set has neither a bits nor a hex fallback"
            );
            8
        }
    }

    /// The length in bytes of the longest token, at least 1.
    pub fn max_token_len(&self) -> usize {
        self.tokens.iter().map(Token::len).max().unwrap_or(1)
    }

    /// The length in bytes of the symbol `r` refers to.
    pub fn ref_len(&self, r: TokenRef) -> usize {
        match r {
            TokenRef::Token(id) => self.tokens[id as usize].len(),
            TokenRef::Literal(_) => 1,
        }
    }

    fn push_token(&mut self, string: Box<[u8]>, value: Option<u8>, mandatory: bool, named: bool) {
        assert!(!string.is_empty(), "token strings must be non-empty");
        let id = self.tokens.len() as u32;
        self.by_string.insert(string.clone(), id);
        self.tokens.push(Token {
            id,
            string,
            value,
            mandatory,
            named,
            suffix: None,
        });
        self.register(id);
    }

    fn register(&mut self, id: u32) {
        let token = &self.tokens[id as usize];
        let Some(value) = token.value else {
            return;
        };
        let slot = Some(NonMaxU32::new(id).unwrap());
        assert!(
            self.byte_by_value[value as usize].is_none(),
            "byte {} is already claimed by another token",
            value
        );
        self.byte_by_value[value as usize] = slot;
        if !token.named {
            return;
        }
        match value {
            HEX_MARKER_VALUE => self.hex_marker = slot,
            BIT0_VALUE => self.bit0 = slot,
            BIT1_VALUE => self.bit1 = slot,
            b'0'..=b'9' => self.hex_by_value[(value - b'0') as usize] = slot,
            b'a'..=b'f' => self.hex_by_value[(value - b'a' + 10) as usize] = slot,
            _ => {}
        }
    }

    /// Adds the single-byte token for `value`. Does nothing when the byte is
    /// already a token. Claims the named fallback slots when `value` is one
    /// of the reserved codes.
    pub fn add_byte(&mut self, value: u8, mandatory: bool) {
        if self.by_string.contains_key([value].as_slice()) {
            return;
        }
        self.push_token(Box::new([value]), Some(value), mandatory, true);
    }

    /// Adds a non-mandatory token for `string`. Does nothing when the string
    /// is already a token. Single-byte strings are indexed by value but do
    /// not claim the named fallback slots.
    ///
    /// # Panics
    ///
    /// Panics if `string` is empty.
    pub fn add_string(&mut self, string: &[u8]) {
        if self.by_string.contains_key(string) {
            return;
        }
        let value = if string.len() == 1 {
            Some(string[0])
        } else {
            None
        };
        self.push_token(string.into(), value, false, false);
    }

    /// Removes the token for `string`, renumbering the remaining ids so they
    /// stay `0..ntokens`. Any id-indexed statistics are stale afterwards and
    /// must be rebuilt.
    ///
    /// # Panics
    ///
    /// Panics when the string is not a token of the set or the token is
    /// mandatory. Both are programmer errors.
    pub fn remove_token(&mut self, string: &[u8]) {
        let id = *self
            .by_string
            .get(string)
            .unwrap_or_else(|| panic!("removing unknown token {}", utils::display_form(string)));
        assert!(
            !self.tokens[id as usize].mandatory,
            "removing mandatory token {}",
            utils::display_form(string)
        );
        self.tokens.remove(id as usize);
        self.rebuild_indices();
    }

    /// Reorders the tokens lexicographically by string and renumbers the ids.
    /// Only the serialization layer relies on sorted order.
    pub fn sort(&mut self) {
        self.tokens.sort_by(|a, b| a.string.cmp(&b.string));
        self.rebuild_indices();
    }

    fn rebuild_indices(&mut self) {
        self.by_string.clear();
        self.byte_by_value = [None; 256];
        self.hex_by_value = [None; 16];
        self.hex_marker = None;
        self.bit0 = None;
        self.bit1 = None;
        for i in 0..self.tokens.len() {
            let token = &mut self.tokens[i];
            token.id = i as u32;
            token.suffix = None;
            self.by_string.insert(token.string.clone(), i as u32);
        }
        for id in 0..self.tokens.len() as u32 {
            self.register(id);
        }
    }

    /// Computes the cached suffix link of every token: the longest other
    /// token that is a proper suffix of its string, else the literal sentinel
    /// for its last byte. Must run after the last mutation and before a
    /// scanner table is built over the set; tokenizer constructors call it.
    pub fn compute_suffix_tokens(&mut self) {
        let links: Vec<Option<TokenRef>> = self
            .tokens
            .iter()
            .map(|token| {
                if token.string.len() == 1 {
                    return None;
                }
                for start in 1..token.string.len() {
                    if let Some(&id) = self.by_string.get(&token.string[start..]) {
                        return Some(TokenRef::Token(id));
                    }
                }
                Some(TokenRef::Literal(*token.string.last().unwrap()))
            })
            .collect();
        for (token, link) in self.tokens.iter_mut().zip(links) {
            token.suffix = link;
        }
    }
}

/// Builds the seed set for the bits fallback: the two mandatory bit tokens
/// at byte values 17 and 18. A literal costs 8 output tokens.
pub fn build_bits_token_set() -> TokenSet {
    let mut token_set = TokenSet::new();
    token_set.add_byte(BIT0_VALUE, true);
    token_set.add_byte(BIT1_VALUE, true);
    token_set
}

/// Builds the seed set for the hex fallback: the mandatory marker at byte
/// value 16 plus the sixteen hex digit tokens. A literal costs 3 output
/// tokens.
pub fn build_hex_token_set() -> TokenSet {
    let mut token_set = TokenSet::new();
    token_set.add_byte(HEX_MARKER_VALUE, true);
    for b in b'0'..=b'9' {
        token_set.add_byte(b, true);
    }
    for b in b'a'..=b'f' {
        token_set.add_byte(b, true);
    }
    token_set
}
