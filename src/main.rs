use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tinytok::artifact;
use tinytok::source::{ChunkProvider, TextFile};
use tinytok::tokenizer::OptimalTokenizer;
use tinytok::trainer::{train, TrainOptions};
use tinytok::utils::display_form;
use tinytok::FilterChain;

#[derive(Debug, Parser)]
#[command(name = "tinytok")]
#[command(version)]
#[command(about = "Train and apply byte-level tokenizers with tiny alphabets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a tokenizer over a data file and save the best vocabulary.
    Generate {
        /// Training data file (any byte stream; UTF-8 enables the filters).
        training_data: PathBuf,
        /// Target vocabulary size, fallback tokens included.
        ntokens: usize,
        /// Output JSON artifact path.
        output: PathBuf,
        /// Number of random chunks per tokenization pass (0 = whole file).
        #[arg(long, default_value_t = 1024)]
        nchunks: usize,
        /// Size of each sampled chunk in bytes.
        #[arg(long, default_value_t = 16384)]
        chunk_size: usize,
        /// Chunk sampler seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Load a saved vocabulary, tokenize a data file and print statistics.
    Scan {
        /// Saved tokenizer artifact.
        tokens_json: PathBuf,
        /// Data file to tokenize.
        data_file: PathBuf,
        /// Also list the most frequent tokens.
        #[arg(long)]
        show_tokens: bool,
    },
}

fn generate(
    training_data: &PathBuf,
    ntokens: usize,
    output: &PathBuf,
    nchunks: usize,
    chunk_size: usize,
    seed: u64,
) -> Result<()> {
    let file = TextFile::open(training_data)
        .with_context(|| format!("cannot open {}", training_data.display()))?;
    let options = TrainOptions {
        ntokens,
        nchunks,
        chunk_size,
        seed,
    };
    let trained = train(&file, &options);
    println!(
        "best configuration: {} filters={:?} fallback16={}",
        trained.optimizer.kind, trained.optimizer.filters, trained.optimizer.fallback16
    );
    println!(
        "{} tokens, {} total over {} bytes, {:.4} bytes/token, {:.4} bits/byte",
        trained.stats.ntokens,
        trained.stats.total_tokens,
        trained.stats.scanned_bytes,
        trained.stats.bytes_per_token,
        trained.stats.bits_per_byte
    );
    artifact::save(&trained, output)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!("saved {}", output.display());
    Ok(())
}

fn scan(tokens_json: &PathBuf, data_file: &PathBuf, show_tokens: bool) -> Result<()> {
    let mut token_set = artifact::load(tokens_json)
        .with_context(|| format!("cannot load {}", tokens_json.display()))?;
    let file =
        TextFile::open(data_file).with_context(|| format!("cannot open {}", data_file.display()))?;
    let data = ChunkProvider::whole(&file, FilterChain::Raw);
    let tokenizer = OptimalTokenizer::new(&mut token_set);
    let stats = tokenizer.tokenize_chunks(&data);
    println!("scanned {} bytes", stats.scanned_bytes());
    println!("using a token set with {} tokens", stats.ntokens());
    println!(
        "used {} different tokens, total: {}",
        stats.used_tokens(),
        stats.total_tokens()
    );
    println!(
        "bytes per token: {:.4}, bits per byte: {:.4}",
        stats.bytes_per_token(),
        stats.bits_per_byte()
    );
    if show_tokens {
        for (id, count) in stats.top_counts().into_iter().take(200) {
            println!(
                "{} {}",
                display_form(tokenizer.token_set().token(id).string()),
                count
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match &cli.command {
        Command::Generate {
            training_data,
            ntokens,
            output,
            nchunks,
            chunk_size,
            seed,
        } => generate(training_data, *ntokens, output, *nchunks, *chunk_size, *seed),
        Command::Scan {
            tokens_json,
            data_file,
            show_tokens,
        } => scan(tokens_json, data_file, *show_tokens),
    }
}
