//! Code-point filters that fold capitalization and word boundaries into small
//! alphabet extensions before tokenization.
//!
//! A filter consumes a stream of Unicode code points and emits another one.
//! Chains compose left-to-right during encode and in reverse during decode;
//! the typical full order is [`Reserved`] then [`Caps`] then [`Words`].
//! Decode adapters exist only for the invertible filters; the training
//! pipeline itself is forward-only.
use std::borrow::Cow;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Marks the next word as Titlecase: first letter upper, rest lower.
pub const CHR_CAPITALIZE: char = '\u{14}';
/// Marks the next word as all caps.
pub const CHR_ALL_CAPS: char = '\u{15}';
/// Marks the end of a word whose trailing space was elided or absent.
pub const CHR_END_OF_WORD: char = '\u{16}';
/// Replacement for code points inside the reserved filter range.
pub const CHR_UNKNOWN: char = '\u{E000}';
/// Separates documents in a merged training corpus.
pub const CHR_DOC_BOUNDARY: char = '\u{E013}';

fn is_reserved(c: char) -> bool {
    ('\u{10}'..='\u{17}').contains(&c)
}

fn is_word_marker(c: char) -> bool {
    c == CHR_CAPITALIZE || c == CHR_ALL_CAPS
}

/// Replaces any code point in the reserved range `U+0010..U+0017` with
/// [`CHR_UNKNOWN`], so raw text can never collide with filter output.
/// Idempotent and intentionally lossy; it has no decode adapter.
pub struct Reserved<I> {
    inner: I,
}

impl<I: Iterator<Item = char>> Reserved<I> {
    /// Wraps a code-point stream.
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I: Iterator<Item = char>> Iterator for Reserved<I> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|c| if is_reserved(c) { CHR_UNKNOWN } else { c })
    }
}

/// Folds capitalization into markers: a Titlecase word becomes
/// [`CHR_CAPITALIZE`] plus the lowercased word, an all-caps word becomes
/// [`CHR_ALL_CAPS`] plus the lowercased word, and anything else passes
/// verbatim. Alphabetic runs and case use the Unicode defaults.
pub struct Caps<I> {
    inner: I,
    pending: VecDeque<char>,
}

impl<I: Iterator<Item = char>> Caps<I> {
    /// Wraps a code-point stream.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
        }
    }

    fn flush_run(&mut self, run: &[char], trailing: Option<char>) {
        let first_upper = run[0].is_uppercase();
        let rest_lower = run[1..].iter().all(|c| c.is_lowercase());
        let all_upper = run.iter().all(|c| c.is_uppercase());
        if first_upper && rest_lower {
            self.pending.push_back(CHR_CAPITALIZE);
            self.pending.extend(run.iter().flat_map(|c| c.to_lowercase()));
        } else if all_upper {
            self.pending.push_back(CHR_ALL_CAPS);
            self.pending.extend(run.iter().flat_map(|c| c.to_lowercase()));
        } else {
            self.pending.extend(run.iter().copied());
        }
        self.pending.extend(trailing);
    }
}

impl<I: Iterator<Item = char>> Iterator for Caps<I> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(c) = self.pending.pop_front() {
            return Some(c);
        }
        let c = self.inner.next()?;
        if !c.is_alphabetic() {
            return Some(c);
        }
        let mut run = vec![c];
        let mut trailing = None;
        for d in self.inner.by_ref() {
            if d.is_alphabetic() {
                run.push(d);
            } else {
                trailing = Some(d);
                break;
            }
        }
        self.flush_run(&run, trailing);
        self.pending.pop_front()
    }
}

/// Reverses [`Caps`]: restores the case the markers encode.
pub struct CapsDecode<I> {
    inner: I,
    pending: VecDeque<char>,
    all_caps_run: bool,
}

impl<I: Iterator<Item = char>> CapsDecode<I> {
    /// Wraps a code-point stream produced by [`Caps`].
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            all_caps_run: false,
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for CapsDecode<I> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Some(c);
            }
            let c = self.inner.next()?;
            if self.all_caps_run {
                if c.is_alphabetic() {
                    self.pending.extend(c.to_uppercase());
                    continue;
                }
                self.all_caps_run = false;
            }
            match c {
                CHR_CAPITALIZE => {
                    let d = self.inner.next()?;
                    self.pending.extend(d.to_uppercase());
                }
                CHR_ALL_CAPS => self.all_caps_run = true,
                _ => return Some(c),
            }
        }
    }
}

/// Turns unambiguous inter-word spaces into end-of-word markers: after every
/// alphabetic run one [`CHR_END_OF_WORD`] is emitted, and a following space
/// is elided when the character after it resumes a word (alphabetic or a
/// capitalization marker). All other formatting passes through.
pub struct Words<I> {
    inner: I,
    pending: VecDeque<char>,
    stash: Option<char>,
    in_run: bool,
}

impl<I: Iterator<Item = char>> Words<I> {
    /// Wraps a code-point stream.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            stash: None,
            in_run: false,
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Words<I> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(c) = self.pending.pop_front() {
            return Some(c);
        }
        let c = match self.stash.take().or_else(|| self.inner.next()) {
            Some(c) => c,
            None => {
                if self.in_run {
                    self.in_run = false;
                    return Some(CHR_END_OF_WORD);
                }
                return None;
            }
        };
        if c.is_alphabetic() {
            self.in_run = true;
            return Some(c);
        }
        if !self.in_run {
            return Some(c);
        }
        self.in_run = false;
        if c == ' ' {
            match self.inner.next() {
                Some(d) if d.is_alphabetic() || is_word_marker(d) => {
                    // The space is recoverable from the marker alone.
                    self.stash = Some(d);
                }
                Some(d) => {
                    self.pending.push_back(' ');
                    self.pending.push_back(d);
                }
                None => self.pending.push_back(' '),
            }
        } else {
            self.pending.push_back(c);
        }
        Some(CHR_END_OF_WORD)
    }
}

/// Reverses [`Words`]: reinserts the spaces the markers elided and drops the
/// markers.
pub struct WordsDecode<I> {
    inner: I,
    stash: Option<char>,
}

impl<I: Iterator<Item = char>> WordsDecode<I> {
    /// Wraps a code-point stream produced by [`Words`].
    pub fn new(inner: I) -> Self {
        Self { inner, stash: None }
    }
}

impl<I: Iterator<Item = char>> Iterator for WordsDecode<I> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = self.stash.take().or_else(|| self.inner.next())?;
            if c != CHR_END_OF_WORD {
                return Some(c);
            }
            match self.inner.next() {
                Some(d) if d.is_alphabetic() || is_word_marker(d) => {
                    self.stash = Some(d);
                    return Some(' ');
                }
                Some(d) => self.stash = Some(d),
                None => return None,
            }
        }
    }
}

/// The filter presets the trainer enumerates, applied to every chunk before
/// mining and tokenization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterChain {
    /// No filtering; bytes pass through untouched.
    #[default]
    Raw,
    /// Capitalization folding only.
    Caps,
    /// Capitalization folding plus end-of-word markers.
    CapsWords,
}

impl FilterChain {
    /// Every preset, in the order the trainer tries them.
    pub const ALL: [FilterChain; 3] = [FilterChain::Raw, FilterChain::Caps, FilterChain::CapsWords];

    /// The filter names recorded in the trained artifact.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FilterChain::Raw => &[],
            FilterChain::Caps => &["caps"],
            FilterChain::CapsWords => &["caps", "words"],
        }
    }

    /// Encodes one chunk through the chain.
    ///
    /// The filters operate on decoded code points, so chunks that are not
    /// valid UTF-8 bypass the chain and come back borrowed, as does anything
    /// under the [`FilterChain::Raw`] preset.
    pub fn encode<'d>(&self, chunk: &'d [u8]) -> Cow<'d, [u8]> {
        if *self == FilterChain::Raw {
            return Cow::Borrowed(chunk);
        }
        let Ok(text) = std::str::from_utf8(chunk) else {
            return Cow::Borrowed(chunk);
        };
        let out: String = match self {
            FilterChain::Raw => unreachable!(),
            FilterChain::Caps => Caps::new(text.chars()).collect(),
            FilterChain::CapsWords => Words::new(Caps::new(text.chars())).collect(),
        };
        Cow::Owned(out.into_bytes())
    }
}
