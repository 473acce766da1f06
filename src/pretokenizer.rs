//! Decodes a byte range as UTF-8, excises special tokens, and applies the
//! fixed GPT-2-style pre-tokenization regex to build a per-chunk frequency
//! table. Uses `fancy_regex` rather than `regex` because the pattern's
//! `\s+(?!\S)` alternative needs negative lookahead, which `regex` does not
//! support.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use std::sync::OnceLock;

use fancy_regex::Regex;

use crate::bpe::{token_from_bytes, Token};
use crate::error::{Result, TrainError};

/// The fixed GPT-2-style pre-tokenization pattern.
pub const PRETOKEN_PATTERN: &str =
    r"'(?:[sdmt]|ll|ve|re)| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

static PRETOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn pretoken_regex() -> &'static Regex {
    PRETOKEN_REGEX.get_or_init(|| Regex::new(PRETOKEN_PATTERN).expect("fixed pattern is valid"))
}

/// Builds the regex used to split on special-token occurrences (discarding
/// the delimiters). Returns `None` when there are no special tokens, so
/// callers can skip splitting entirely.
fn special_token_regex(special_tokens: &[String]) -> Result<Option<Regex>> {
    if special_tokens.is_empty() {
        return Ok(None);
    }
    let escaped: Vec<String> = special_tokens.iter().map(|s| fancy_regex::escape(s)).collect();
    Ok(Some(Regex::new(&escaped.join("|"))?))
}

/// Splits `text` on occurrences of any special token, discarding the
/// delimiters themselves.
fn split_on_special_tokens<'a>(text: &'a str, pattern: Option<&Regex>) -> Vec<&'a str> {
    let Some(pattern) = pattern else {
        return vec![text];
    };
    let mut pieces = Vec::new();
    let mut start = 0;
    for found in pattern.find_iter(text) {
        let Ok(m) = found else { break };
        pieces.push(&text[start..m.start()]);
        start = m.end();
    }
    pieces.push(&text[start..]);
    pieces
}

/// Pre-tokenizes the byte range `[start, end)` of the file at `path`,
/// returning a frequency table over pre-tokens derived from that range.
pub fn pretokenize_range(
    path: &Path, start: u64, end: u64, special_tokens: &[String],
) -> Result<HashMap<Token, u64>> {
    let mut file = File::open(path).map_err(|source| TrainError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let len = (end - start) as usize;
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(start)).map_err(|source| TrainError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    file.read_exact(&mut buf).map_err(|source| TrainError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let text = String::from_utf8_lossy(&buf).into_owned();
    let special_regex = special_token_regex(special_tokens)?;
    let pieces = split_on_special_tokens(&text, special_regex.as_ref());

    let mut freqs: HashMap<Token, u64> = HashMap::new();
    let regex = pretoken_regex();
    for piece in pieces {
        for found in regex.find_iter(piece) {
            let Ok(m) = found else { continue };
            let token = token_from_bytes(m.as_str().as_bytes());
            *freqs.entry(token).or_insert(0) += 1;
        }
    }
    log::trace!("pretokenizer: chunk [{start},{end}) yielded {} distinct pre-tokens", freqs.len());
    Ok(freqs)
}
