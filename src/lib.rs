/*!
# tinytok

This crate trains and applies a compact byte-level tokenizer: it re-encodes an
input byte stream into a sequence of ids drawn from a very small alphabet
(typically 2–256 symbols) while minimizing the total number of emitted
symbols. Every byte stays representable even when the alphabet cannot contain
it directly, through a mandatory fallback sub-alphabet: either two bit tokens
(8 symbols per unmatched byte) or a hex marker plus sixteen digits (3 symbols
per unmatched byte).

Here is a quick example of how this crate works:

```rust
use tinytok::tokenizer::OptimalTokenizer;
use tinytok::vocabulary::build_hex_token_set;

let mut token_set = build_hex_token_set();
token_set.add_string(b"hello");
token_set.add_string(b" world");
let tokenizer = OptimalTokenizer::new(&mut token_set);
let ids: Vec<u32> = tokenizer.tokenize(b"hello world!".iter().copied()).collect();
// "hello", " world", then the literal expansion of '!' (0x21):
// the hex marker and the digit tokens for '2' and '1'.
assert_eq!(ids, vec![17, 18, 0, 3, 2]);
```

# Overview

The two central types are [`vocabulary::TokenSet`], the mutable vocabulary
under training, and [`tokenizer::OptimalTokenizer`], which freezes a set and
emits the minimum-cost token sequence for any byte stream. The tokenizer runs
a sliding-window dynamic program over the longest-match stream of a
[`scanner::SuffixScanner`], so tokenization is streaming with constant
memory.

Training is driven by [`trainer::train`]: it mines frequent substrings
([`mining`]) from chunked samples of a memory-mapped file ([`source`]),
optionally folds capitalization and word boundaries into small alphabet
extensions ([`filters`]), seeds candidate vocabularies, refines them with the
optimizers in [`optimizer`], and keeps the configuration with the fewest
total emitted tokens. [`artifact`] persists the winner as pretty-printed
JSON.

```no_run
use tinytok::source::TextFile;
use tinytok::trainer::{train, TrainOptions};

let file = TextFile::open("corpus.txt")?;
let trained = train(&file, &TrainOptions::new(64));
tinytok::artifact::save(&trained, "tokens64.json")?;
# Ok::<(), std::io::Error>(())
```

# Performance

The scanner does O(1) work per byte after a one-time table construction, and
the dynamic-programming window holds about as many entries as the longest
token is long. Training cost is dominated by repeated tokenization passes;
the chunk sampler bounds each pass to `nchunks · chunk_size` bytes regardless
of corpus size.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod artifact;
pub mod filters;
pub mod mining;
pub mod optimizer;
pub mod scanner;
pub mod source;
pub mod stats;
pub mod tokenizer;
pub mod trainer;
pub mod utils;
pub mod vocabulary;

pub use filters::FilterChain;
pub use scanner::SuffixScanner;
pub use source::{ChunkProvider, TextFile};
pub use stats::{StatsSummary, TokenStats};
pub use tokenizer::{ByteTokenizer, GreedyTokenizer, OptimalTokenizer};
pub use trainer::{train, TrainOptions, Trained};
pub use vocabulary::{build_bits_token_set, build_hex_token_set, Token, TokenRef, TokenSet};
