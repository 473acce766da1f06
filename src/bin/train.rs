//! CLI entry point: trains a BPE vocabulary over a corpus file and writes
//! the resulting `(vocab, merges)` artifact as JSON.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bpe_trainer::{train, TrainerConfig};
use clap::Parser;
use serde::Serialize;

/// Train a BPE tokenizer vocabulary from a text corpus.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the UTF-8 corpus file.
    #[arg(long)]
    input: PathBuf,

    /// Target vocabulary size (must be >= 256 + number of special tokens).
    #[arg(long)]
    vocab_size: usize,

    /// Special tokens, in order. The first is the chunk split marker.
    /// Defaults to `["<|endoftext|>"]` when omitted.
    #[arg(long = "special-token")]
    special_tokens: Vec<String>,

    /// Upper bound on parallel pre-tokenization chunks.
    #[arg(long, default_value_t = 16)]
    chunks: usize,

    /// Where to write the trained `(vocab, merges)` JSON artifact. Prints
    /// to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct TrainedArtifact {
    vocab:  HashMap<u32, String>,
    merges: Vec<(String, String)>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let special_tokens = if cli.special_tokens.is_empty() {
        vec!["<|endoftext|>".to_string()]
    } else {
        cli.special_tokens
    };
    let config =
        TrainerConfig::new(cli.vocab_size, special_tokens).with_desired_chunk_count(cli.chunks);

    let (vocab, merges) = train(&config, &cli.input)?;
    log::info!("trained vocab of {} entries, {} merges", vocab.len(), merges.len());

    let artifact = TrainedArtifact {
        vocab:  vocab.into_iter().map(|(id, bytes)| (id, BASE64.encode(bytes))).collect(),
        merges: merges
            .into_iter()
            .map(|(a, b)| (BASE64.encode(a), BASE64.encode(b)))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&artifact)?;

    match cli.out {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
