//! Vocabulary optimizers: dead-token pruning, leave-one-out pruning, and
//! byte-pair growth with a refinement sweep.
//!
//! All three share the same contract: they mutate a seeded [`TokenSet`]
//! towards `target` tokens, evaluating every candidate set with the optimal
//! tokenizer over the provider's filtered chunks. Mandatory tokens are never
//! touched.
use ahash::AHashMap;

use crate::source::ChunkProvider;
use crate::stats::TokenStats;
use crate::tokenizer::OptimalTokenizer;
use crate::utils;
use crate::vocabulary::{TokenRef, TokenSet};

fn tokenize_once(token_set: &mut TokenSet, data: &ChunkProvider) -> TokenStats {
    OptimalTokenizer::new(token_set).tokenize_chunks(data)
}

fn remove_dead_tokens(token_set: &mut TokenSet, stats: &TokenStats) {
    let dead: Vec<Box<[u8]>> = token_set
        .tokens()
        .iter()
        .filter(|t| !t.is_mandatory() && stats.token_count(t.id()) == 0)
        .map(|t| t.string().into())
        .collect();
    for string in &dead {
        token_set.remove_token(string);
    }
    if !dead.is_empty() {
        log::debug!("removed {} tokens with zero occurrences", dead.len());
    }
}

/// Shrinks the set to `target` tokens by repeatedly retokenizing and
/// dropping the least-used non-mandatory token.
///
/// Cheap and monotone in vocabulary size, but the output cost can
/// transiently grow: a rarely-used long token sometimes saves more than a
/// popular short one.
pub fn prune_simple(token_set: &mut TokenSet, data: &ChunkProvider, target: usize) {
    let stats = tokenize_once(token_set, data);
    remove_dead_tokens(token_set, &stats);
    while token_set.ntokens() > target {
        let stats = tokenize_once(token_set, data);
        let victim = token_set
            .tokens()
            .iter()
            .filter(|t| !t.is_mandatory())
            .min_by_key(|t| stats.token_count(t.id()))
            .map(|t| t.string().to_vec());
        let Some(victim) = victim else {
            break;
        };
        log::debug!("pruning {}", utils::display_form(&victim));
        token_set.remove_token(&victim);
    }
}

/// Shrinks the set to `target` tokens by leave-one-out evaluation: per round
/// the `top_to_remove` least-used non-mandatory tokens (all of them when 0)
/// are each tentatively removed, and the removal with the smallest total
/// cost wins.
///
/// O(top_to_remove · |data|) per removed token, and considerably better
/// final cost than [`prune_simple`].
pub fn prune_useful(
    token_set: &mut TokenSet,
    data: &ChunkProvider,
    target: usize,
    top_to_remove: usize,
) {
    let stats = tokenize_once(token_set, data);
    remove_dead_tokens(token_set, &stats);
    while token_set.ntokens() > target {
        let stats = tokenize_once(token_set, data);
        let mut candidates: Vec<(u64, Box<[u8]>)> = token_set
            .tokens()
            .iter()
            .filter(|t| !t.is_mandatory())
            .map(|t| (stats.token_count(t.id()), t.string().into()))
            .collect();
        candidates.sort_unstable();
        if top_to_remove > 0 {
            candidates.truncate(top_to_remove);
        }
        let mut best: Option<(u64, Box<[u8]>)> = None;
        for (_, string) in &candidates {
            let mut trial = token_set.clone();
            trial.remove_token(string);
            let cost = tokenize_once(&mut trial, data).total_tokens();
            if best.as_ref().map_or(true, |(b, _)| cost < *b) {
                best = Some((cost, string.clone()));
            }
        }
        let Some((cost, victim)) = best else {
            break;
        };
        log::debug!(
            "removing {} keeps the total at {}",
            utils::display_form(&victim),
            cost
        );
        token_set.remove_token(&victim);
    }
}

struct PairStats {
    literal_count: [u64; 256],
    pair_count: AHashMap<u64, u64>,
    total_cost: u64,
}

fn pair_key(first: u32, second: u32) -> u64 {
    ((first as u64) << 32) | second as u64
}

fn collect_pair_stats(token_set: &mut TokenSet, data: &ChunkProvider) -> PairStats {
    let tokenizer = OptimalTokenizer::new(token_set);
    let literal_cost = tokenizer.literal_cost();
    let mut literal_count = [0u64; 256];
    let mut pair_count: AHashMap<u64, u64> = AHashMap::new();
    let mut total_cost = 0u64;
    for chunk in data.chunks() {
        let mut prev: Option<TokenRef> = None;
        for r in tokenizer.tokenize_refs(chunk.iter().copied()) {
            match r {
                TokenRef::Token(id) => {
                    total_cost += 1;
                    if let Some(TokenRef::Token(prev_id)) = prev {
                        *pair_count.entry(pair_key(prev_id, id)).or_insert(0) += 1;
                    }
                }
                TokenRef::Literal(byte) => {
                    total_cost += literal_cost;
                    literal_count[byte as usize] += 1;
                }
            }
            prev = Some(r);
        }
    }
    PairStats {
        literal_count,
        pair_count,
        total_cost,
    }
}

// The most valuable absent string: the concatenation of an adjacent token
// pair by pair frequency, or a single literal byte weighted by the fallback
// inflation it would remove.
fn best_candidate(
    token_set: &TokenSet,
    pairs: &PairStats,
    literal_cost: u64,
) -> Option<Box<[u8]>> {
    let mut values: AHashMap<Box<[u8]>, u64> = AHashMap::new();
    for (value, &count) in pairs.literal_count.iter().enumerate() {
        if count > 0 {
            values.insert(Box::new([value as u8]), count * (literal_cost - 1));
        }
    }
    for (&key, &count) in pairs.pair_count.iter() {
        if count == 0 {
            continue;
        }
        let first = token_set.token((key >> 32) as u32);
        let second = token_set.token(key as u32);
        let mut string = Vec::with_capacity(first.len() + second.len());
        string.extend_from_slice(first.string());
        string.extend_from_slice(second.string());
        *values.entry(string.into()).or_insert(0) += count;
    }
    let mut ranked: Vec<(Box<[u8]>, u64)> = values.into_iter().collect();
    utils::sort_by_count_desc(&mut ranked);
    ranked
        .into_iter()
        .map(|(string, _)| string)
        .find(|string| !token_set.contains(string))
}

/// Grows the set with byte-pair-style merges and refines it once the target
/// is reached.
///
/// Each round adds the most valuable absent string. Above the target, the
/// round must pay for itself: non-mandatory tokens are swept in ascending
/// occurrence order and the first removal whose total cost beats the total
/// from before the addition is kept. When no removal pays, the last addition
/// is undone and the search stops.
pub fn grow_bpe(token_set: &mut TokenSet, data: &ChunkProvider, target: usize) {
    loop {
        let pairs = collect_pair_stats(token_set, data);
        let literal_cost = token_set.literal_cost();
        let Some(candidate) = best_candidate(token_set, &pairs, literal_cost) else {
            log::debug!("no merge candidates left");
            return;
        };
        let cost_before_add = pairs.total_cost;
        token_set.add_string(&candidate);
        log::debug!("added {}", utils::display_form(&candidate));
        if token_set.ntokens() <= target {
            continue;
        }

        let stats = tokenize_once(token_set, data);
        let mut sweep: Vec<(u64, Box<[u8]>)> = token_set
            .tokens()
            .iter()
            .filter(|t| !t.is_mandatory() && t.string() != candidate.as_ref())
            .map(|t| (stats.token_count(t.id()), t.string().into()))
            .collect();
        sweep.sort_unstable();

        let mut improved = false;
        for (_, string) in &sweep {
            let mut trial = token_set.clone();
            trial.remove_token(string);
            let cost = tokenize_once(&mut trial, data).total_tokens();
            if cost < cost_before_add {
                log::debug!(
                    "replaced {} with {} ({} -> {} tokens)",
                    utils::display_form(string),
                    utils::display_form(&candidate),
                    cost_before_add,
                    cost
                );
                *token_set = trial;
                improved = true;
                break;
            }
        }
        if !improved {
            token_set.remove_token(&candidate);
            return;
        }
    }
}
