//! The training driver: enumerates tokenizer configurations and keeps the one
//! that minimizes the total number of emitted tokens.
use serde::{Deserialize, Serialize};

use crate::filters::FilterChain;
use crate::mining;
use crate::optimizer;
use crate::source::{ChunkProvider, TextFile};
use crate::stats::StatsSummary;
use crate::tokenizer::OptimalTokenizer;
use crate::vocabulary::{build_bits_token_set, build_hex_token_set, TokenSet};

const SEED_MULTIPLIERS: [usize; 2] = [2, 4];
const TOP_TO_REMOVE: usize = 8;

/// Options of one training run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainOptions {
    /// The target vocabulary size, fallback tokens included.
    pub ntokens: usize,
    /// How many random chunks each tokenization pass samples. Zero means the
    /// whole file every pass.
    pub nchunks: usize,
    /// The size of each sampled chunk in bytes.
    pub chunk_size: usize,
    /// Seed of the chunk sampler; runs with equal options are deterministic.
    pub seed: u64,
}

impl TrainOptions {
    /// Default chunking (1024 chunks of 16 KiB) for a target size.
    pub fn new(ntokens: usize) -> Self {
        Self {
            ntokens,
            nchunks: 1024,
            chunk_size: 16384,
            seed: 0,
        }
    }
}

/// The `optimizer` object of the trained artifact: which configuration won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerInfo {
    /// True when the winning vocabulary uses the hex fallback.
    pub fallback16: bool,
    /// The seeding/optimization strategy name.
    #[serde(rename = "type")]
    pub kind: String,
    /// The filter names of the winning chain, in application order.
    pub filters: Vec<String>,
    /// Seed multiplier for the pruning strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_mult: Option<f64>,
    /// Seeded vocabulary size before pruning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_tokens: Option<usize>,
    /// Leave-one-out candidate window of `prune_useful`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_to_remove: Option<usize>,
}

/// The result of a training run: the winning vocabulary, sorted for
/// serialization, with its statistics and configuration.
#[derive(Debug, Clone)]
pub struct Trained {
    /// The winning vocabulary, sorted by token string.
    pub token_set: TokenSet,
    /// Statistics of the winning tokenization pass.
    pub stats: StatsSummary,
    /// The winning configuration.
    pub optimizer: OptimizerInfo,
}

struct Candidate {
    token_set: TokenSet,
    info: OptimizerInfo,
}

fn base_set(fallback16: bool) -> TokenSet {
    if fallback16 {
        build_hex_token_set()
    } else {
        build_bits_token_set()
    }
}

fn add_top_bytes(token_set: &mut TokenSet, top_bytes: &[(u8, u64)], max_tokens: usize) {
    for &(value, _) in top_bytes {
        if token_set.ntokens() >= max_tokens {
            break;
        }
        token_set.add_byte(value, false);
    }
}

fn add_top_strings(token_set: &mut TokenSet, top_str: &[(Box<[u8]>, u64)], max_tokens: usize) {
    for (string, _) in top_str {
        if token_set.ntokens() >= max_tokens {
            break;
        }
        token_set.add_string(string);
    }
}

// The pruning strategies start from an oversized seed: the first
// `init_strings` mined strings and the first `init_strings` frequent bytes,
// without a size cap.
fn pruning_seed(
    fallback16: bool,
    top_bytes: &[(u8, u64)],
    top_str: &[(Box<[u8]>, u64)],
    init_strings: usize,
) -> TokenSet {
    let mut token_set = base_set(fallback16);
    for (string, _) in top_str.iter().take(init_strings) {
        token_set.add_string(string);
    }
    for &(value, _) in top_bytes.iter().take(init_strings) {
        token_set.add_byte(value, false);
    }
    token_set
}

fn candidates(
    data: &ChunkProvider,
    fallback16: bool,
    ntokens: usize,
    top_bytes: &[(u8, u64)],
    top_str: &[(Box<[u8]>, u64)],
) -> Vec<Candidate> {
    let chain = data.filters();
    let info = |kind: &str| OptimizerInfo {
        fallback16,
        kind: kind.to_string(),
        filters: chain.names().iter().map(|s| s.to_string()).collect(),
        init_mult: None,
        init_tokens: None,
        top_to_remove: None,
    };
    let mut out = Vec::new();

    let mut token_set = base_set(fallback16);
    add_top_bytes(&mut token_set, top_bytes, ntokens);
    add_top_strings(&mut token_set, top_str, ntokens);
    out.push(Candidate {
        token_set,
        info: info("top_bytes+top_str"),
    });

    let mut token_set = base_set(fallback16);
    add_top_strings(&mut token_set, top_str, ntokens);
    out.push(Candidate {
        token_set,
        info: info("top_str"),
    });

    let mut token_set = base_set(fallback16);
    optimizer::grow_bpe(&mut token_set, data, ntokens);
    out.push(Candidate {
        token_set,
        info: info("bpe"),
    });

    for mult in SEED_MULTIPLIERS {
        let init_strings = mult * ntokens;

        let mut token_set = pruning_seed(fallback16, top_bytes, top_str, init_strings);
        let init_tokens = token_set.ntokens();
        optimizer::prune_simple(&mut token_set, data, ntokens);
        out.push(Candidate {
            token_set,
            info: OptimizerInfo {
                init_mult: Some(mult as f64),
                init_tokens: Some(init_tokens),
                ..info("prune_simple")
            },
        });

        let mut token_set = pruning_seed(fallback16, top_bytes, top_str, init_strings);
        let init_tokens = token_set.ntokens();
        optimizer::prune_useful(&mut token_set, data, ntokens, TOP_TO_REMOVE);
        out.push(Candidate {
            token_set,
            info: OptimizerInfo {
                init_mult: Some(mult as f64),
                init_tokens: Some(init_tokens),
                top_to_remove: Some(TOP_TO_REMOVE),
                ..info("prune_useful")
            },
        });
    }

    out
}

/// Trains a tokenizer over `file`, trying every enabled configuration and
/// returning the one with the fewest total emitted tokens.
///
/// The bits fallback participates only for targets of at most 64 tokens, the
/// hex fallback only for targets of at least 17; both cutoffs are part of
/// the trained-artifact contract.
///
/// # Panics
///
/// Panics when `options.ntokens < 2`; no fallback alphabet fits below that.
pub fn train(file: &TextFile, options: &TrainOptions) -> Trained {
    let ntokens = options.ntokens;
    assert!(ntokens >= 2, "a vocabulary needs at least 2 tokens");

    let mut best: Option<(u64, Trained)> = None;
    for chain in FilterChain::ALL {
        let data = ChunkProvider::new(
            file,
            options.nchunks,
            options.chunk_size,
            chain,
            options.seed,
        );
        log::info!("mining substrings with filters [{}]", chain);
        let top_bytes = mining::top_bytes(&data);
        let top_str = mining::top_substrings(&data, 10 * ntokens);

        for fallback16 in [false, true] {
            if fallback16 && ntokens < 17 {
                continue;
            }
            if !fallback16 && ntokens > 64 {
                continue;
            }
            for candidate in candidates(&data, fallback16, ntokens, &top_bytes, &top_str) {
                let Candidate {
                    mut token_set,
                    info,
                } = candidate;
                let tokenizer = OptimalTokenizer::new(&mut token_set);
                let stats = tokenizer.tokenize_chunks(&data);
                drop(tokenizer);
                let total = stats.total_tokens();
                log::info!(
                    "{} filters=[{}] fallback16={}: {} tokens, {} total, {:.4} bits/byte",
                    info.kind,
                    chain,
                    fallback16,
                    token_set.ntokens(),
                    total,
                    stats.bits_per_byte()
                );
                if best.as_ref().map_or(true, |(b, _)| total < *b) {
                    best = Some((
                        total,
                        Trained {
                            token_set,
                            stats: stats.summary(),
                            optimizer: info,
                        },
                    ));
                }
            }
        }
    }

    let (_, mut trained) = best.expect("at least one fallback is enabled for every target size");
    trained.token_set.sort();
    trained
}
