//! Memory-mapped byte sources and the chunk sampler that feeds training.
use std::borrow::Cow;
use std::cell::RefCell;
use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::filters::FilterChain;

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// A training data file accessed through a private read-only memory mapping.
///
/// The file need not be valid UTF-8; the whole pipeline below the filters is
/// byte-level.
pub struct TextFile {
    map: Mmap,
}

impl TextFile {
    /// Opens and maps a file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be opened or
    /// mapped.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is private and read-only; training runs treat
        // the input file as immutable for their duration.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }

    /// The file length in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True for an empty file.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The entire file contents.
    pub fn all_bytes(&self) -> &[u8] {
        &self.map
    }

    /// Takes a random fragment of at least `length` bytes, aligned outward
    /// to the nearest `separator` on both ends.
    ///
    /// The fragment starts at the separator preceding a uniformly random
    /// offset (or at the file start when there is none) and ends just after
    /// the first separator at or beyond `offset + length − |separator|` (or
    /// at the file end). When `length` covers the whole file the entire
    /// contents come back unsampled.
    pub fn sample_bytes(&self, rng: &mut StdRng, length: usize, separator: &[u8]) -> &[u8] {
        let data = &self.map[..];
        if length >= data.len() {
            return data;
        }
        let approx_start = rng.gen_range(0..data.len() - length);
        let start = rfind(&data[..approx_start], separator).unwrap_or(0);
        let search_from = start + length.saturating_sub(separator.len());
        let finish = match find(&data[search_from..], separator) {
            Some(i) => search_from + i + separator.len(),
            None => data.len(),
        };
        &data[start..finish]
    }
}

/// Yields the chunk stream a training pass consumes: either the whole file
/// once, or a fixed number of independent newline-aligned random samples.
///
/// Every call to [`ChunkProvider::chunks`] draws fresh samples from the
/// provider's own seeded generator, so a training run is deterministic for a
/// given seed while successive passes still see different fragments. Chunks
/// come out already encoded through the provider's [`FilterChain`].
pub struct ChunkProvider<'a> {
    file: &'a TextFile,
    nchunks: usize,
    chunk_size: usize,
    filters: FilterChain,
    rng: RefCell<StdRng>,
}

impl<'a> ChunkProvider<'a> {
    /// Creates a provider sampling `nchunks` chunks of `chunk_size` bytes.
    /// When either is zero, or the file is no larger than their product, the
    /// provider yields the whole file once instead.
    pub fn new(
        file: &'a TextFile,
        nchunks: usize,
        chunk_size: usize,
        filters: FilterChain,
        seed: u64,
    ) -> Self {
        Self {
            file,
            nchunks,
            chunk_size,
            filters,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Creates a provider that always yields the whole file once.
    pub fn whole(file: &'a TextFile, filters: FilterChain) -> Self {
        Self::new(file, 0, 0, filters, 0)
    }

    /// The filter chain applied to every chunk.
    pub fn filters(&self) -> FilterChain {
        self.filters
    }

    fn yields_whole_file(&self) -> bool {
        self.nchunks == 0
            || self.chunk_size == 0
            || self.file.len() <= self.nchunks.saturating_mul(self.chunk_size)
    }

    /// Streams one pass of chunks.
    pub fn chunks(&self) -> Chunks<'_, 'a> {
        Chunks {
            provider: self,
            remaining: if self.yields_whole_file() {
                1
            } else {
                self.nchunks
            },
            whole: self.yields_whole_file(),
        }
    }
}

/// Iterator returned by [`ChunkProvider::chunks`].
pub struct Chunks<'p, 'a> {
    provider: &'p ChunkProvider<'a>,
    remaining: usize,
    whole: bool,
}

impl<'a> Iterator for Chunks<'_, 'a> {
    type Item = Cow<'a, [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let provider = self.provider;
        let raw = if self.whole {
            provider.file.all_bytes()
        } else {
            let mut rng = provider.rng.borrow_mut();
            provider
                .file
                .sample_bytes(&mut rng, provider.chunk_size, b"\n")
        };
        Some(provider.filters.encode(raw))
    }
}
