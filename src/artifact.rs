//! Saving and loading trained tokenizer artifacts as pretty-printed JSON.
use std::io;
use std::path::Path;

use serde_json::{json, Value};

use crate::trainer::Trained;
use crate::vocabulary::{build_bits_token_set, build_hex_token_set, TokenSet};

/// The error type for artifact loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadArtifactError {
    /// Error due to I/O operations on the artifact file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The artifact is not valid JSON.
    #[error("Serde json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The artifact is valid JSON but not a tokenizer document.
    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// Renders one token string as a JSON value: a string when the bytes decode
/// as UTF-8, the byte-integer array otherwise.
pub fn token_value(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::Array(bytes.iter().map(|&b| Value::Number(b.into())).collect()),
    }
}

/// Builds the artifact document for a training result.
pub fn to_json(trained: &Trained) -> Value {
    let tokens: Vec<Value> = trained
        .token_set
        .tokens()
        .iter()
        .map(|t| token_value(t.string()))
        .collect();
    json!({
        "tokens": tokens,
        "stats": serde_json::to_value(&trained.stats).expect("stats summary serializes"),
        "config": { "fallback16": trained.token_set.has_hex() },
        "optimizer": serde_json::to_value(&trained.optimizer).expect("optimizer info serializes"),
    })
}

fn pretty_lines(value: &Value, maxlen: usize) -> Vec<String> {
    let compact = value.to_string();
    if compact.len() <= maxlen || !(value.is_array() || value.is_object()) {
        return vec![compact];
    }
    let mut out = Vec::new();
    // One finished line is held back so the comma can be appended once the
    // next element materializes.
    let mut last: Option<String> = None;
    match value {
        Value::Array(items) => {
            out.push("[".to_string());
            for item in items {
                if let Some(line) = last.take() {
                    out.push(line + ",");
                }
                for subline in pretty_lines(item, maxlen.saturating_sub(2)) {
                    if let Some(line) = last.take() {
                        out.push(line);
                    }
                    last = Some(format!("  {}", subline));
                }
            }
            out.extend(last);
            out.push("]".to_string());
        }
        Value::Object(map) => {
            out.push("{".to_string());
            for (key, item) in map {
                if let Some(line) = last.take() {
                    out.push(line + ",");
                }
                let key_repr = Value::String(key.clone()).to_string();
                let short = format!("  {}: {}", key_repr, item);
                if short.len() <= maxlen + 1 {
                    last = Some(short);
                } else {
                    for subline in pretty_lines(item, maxlen.saturating_sub(2)) {
                        match last.take() {
                            None => last = Some(format!("  {}: {}", key_repr, subline)),
                            Some(line) => {
                                out.push(line);
                                last = Some(format!("  {}", subline));
                            }
                        }
                    }
                }
            }
            out.extend(last);
            out.push("}".to_string());
        }
        _ => unreachable!("scalars are always short enough"),
    }
    out
}

/// Pretty-prints a JSON value, keeping any value on a single line while it
/// fits in roughly 80 columns and nesting with two-space indents otherwise.
pub fn pretty(value: &Value) -> String {
    let mut text = pretty_lines(value, 80).join("\n");
    text.push('\n');
    text
}

/// Writes the artifact document for `trained` to `path`.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be written.
pub fn save(trained: &Trained, path: impl AsRef<Path>) -> io::Result<()> {
    std::fs::write(path, pretty(&to_json(trained)))
}

/// Rebuilds a [`TokenSet`] from artifact JSON text.
///
/// The set starts from the fallback skeleton selected by
/// `config.fallback16`, so the mandatory tokens exist no matter how the
/// token list is ordered; listed tokens that duplicate them are no-ops.
///
/// # Errors
///
/// Returns [`LoadArtifactError`] when the text is not valid JSON or not a
/// tokenizer document.
pub fn from_json_str(text: &str) -> Result<TokenSet, LoadArtifactError> {
    let doc: Value = serde_json::from_str(text)?;
    let fallback16 = doc
        .get("config")
        .and_then(|c| c.get("fallback16"))
        .and_then(Value::as_bool)
        .ok_or_else(|| LoadArtifactError::Invalid("missing config.fallback16".to_string()))?;
    let mut token_set = if fallback16 {
        build_hex_token_set()
    } else {
        build_bits_token_set()
    };
    let tokens = doc
        .get("tokens")
        .and_then(Value::as_array)
        .ok_or_else(|| LoadArtifactError::Invalid("missing tokens array".to_string()))?;
    for entry in tokens {
        let string: Vec<u8> = match entry {
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .filter(|&b| b < 256)
                        .map(|b| b as u8)
                        .ok_or_else(|| {
                            LoadArtifactError::Invalid(format!("bad byte in token: {}", item))
                        })
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(LoadArtifactError::Invalid(format!(
                    "unsupported token entry: {}",
                    entry
                )))
            }
        };
        if string.is_empty() {
            return Err(LoadArtifactError::Invalid("empty token string".to_string()));
        }
        token_set.add_string(&string);
    }
    Ok(token_set)
}

/// Loads a trained vocabulary from an artifact file.
///
/// # Errors
///
/// Returns [`LoadArtifactError`] on I/O failures or malformed documents.
pub fn load(path: impl AsRef<Path>) -> Result<TokenSet, LoadArtifactError> {
    let text = std::fs::read_to_string(path)?;
    from_json_str(&text)
}
