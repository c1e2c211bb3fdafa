//! Frequency mining of the most common bytes and byte substrings.
use ahash::AHashMap;

use crate::scanner::SuffixScanner;
use crate::source::ChunkProvider;
use crate::utils::sort_by_count_desc;
use crate::vocabulary::{TokenRef, TokenSet};

/// Counts every byte value across the provider's chunks and returns the
/// positive counts, most frequent first.
pub fn top_bytes(data: &ChunkProvider) -> Vec<(u8, u64)> {
    let mut counts = [0u64; 256];
    for chunk in data.chunks() {
        for &byte in chunk.iter() {
            counts[byte as usize] += 1;
        }
    }
    let mut pairs: Vec<(u8, u64)> = counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(value, &count)| (value as u8, count))
        .collect();
    sort_by_count_desc(&mut pairs);
    pairs
}

fn prune(counts: AHashMap<Box<[u8]>, u64>, nstrings: usize) -> AHashMap<Box<[u8]>, u64> {
    let mut pairs: Vec<(Box<[u8]>, u64)> = counts.into_iter().collect();
    sort_by_count_desc(&mut pairs);
    pairs.truncate(nstrings);
    pairs.into_iter().collect()
}

/// Finds up to `nstrings` byte substrings with the highest occurrence counts
/// across the provider's chunks.
///
/// The miner expands by length: the survivors of length `L − 1` become a
/// prefix vocabulary, a suffix scanner streams the chunks, and every
/// position whose longest match is exactly such a survivor extends it by the
/// next byte. Pruning back to the top `nstrings` after every round keeps the
/// work linear in the data size per length, at the cost of missing a string
/// whose every prefix was rare. Counts come back in descending order.
pub fn top_substrings(data: &ChunkProvider, nstrings: usize) -> Vec<(Box<[u8]>, u64)> {
    let mut counts: AHashMap<Box<[u8]>, u64> = AHashMap::new();
    for (value, count) in top_bytes(data) {
        counts.insert(Box::new([value]), count);
    }

    for length in 2usize.. {
        let longest = counts.keys().map(|s| s.len()).max().unwrap_or(0);
        if longest < length - 1 {
            break;
        }

        let mut prefixes = TokenSet::new();
        for string in counts.keys() {
            if string.len() == length - 1 {
                prefixes.add_string(string);
            }
        }
        log::debug!(
            "mining length {}: {} surviving prefixes",
            length - 1,
            prefixes.ntokens()
        );
        let scanner = SuffixScanner::new(&prefixes);

        for chunk in data.chunks() {
            let mut state = scanner.start();
            for &byte in chunk.iter() {
                // The prefix set only holds strings of one length, so any
                // vocabulary hit is a full survivor; extend it by the byte
                // about to be consumed.
                if let Some(TokenRef::Token(id)) = scanner.token(state) {
                    let token = prefixes.token(id);
                    debug_assert_eq!(token.len(), length - 1);
                    let mut string = Vec::with_capacity(length);
                    string.extend_from_slice(token.string());
                    string.push(byte);
                    *counts.entry(string.into()).or_insert(0) += 1;
                }
                state = scanner.step(state, byte);
            }
        }

        counts = prune(counts, nstrings);
    }

    let mut pairs: Vec<(Box<[u8]>, u64)> = counts.into_iter().collect();
    sort_by_count_desc(&mut pairs);
    pairs.truncate(nstrings);
    pairs
}
