//! Recovery of PEM private keys that went through environment-variable storage.
//!
//! Hosting dashboards and `.env` loaders regularly hand the key back with
//! literal `\n` sequences, wrapping quotes, or line breaks in odd places. The
//! functions here rebuild a canonical PEM document from whatever survived:
//! header, base64 body padded to a multiple of four and wrapped at 64 columns,
//! footer.

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

const PEM_LINE_WIDTH: usize = 64;
const BEGIN_MARKER: &str = "-----BEGIN ";
const END_MARKER: &str = "-----END ";
const DASHES: &str = "-----";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PemError {
    #[error("private key is empty")]
    Empty,

    #[error("missing PEM header (-----BEGIN ...-----)")]
    MissingHeader,

    #[error("missing PEM footer (-----END {0}-----)")]
    MissingFooter(String),

    #[error("PEM body contains no base64 data")]
    EmptyBody,

    #[error("PEM body is not valid base64: {0}")]
    InvalidBase64(String),
}

/// Turns escaped line breaks into real ones and strips wrapping quotes and whitespace.
pub fn unescape_private_key(raw: &str) -> String {
    let unescaped = raw
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\r", "\n")
        .replace("\r\n", "\n");

    unescaped
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .to_string()
}

/// Rebuilds a well-formed PEM document from a possibly mangled key string.
pub fn normalize_private_key(raw: &str) -> Result<String, PemError> {
    let key = unescape_private_key(raw);
    if key.is_empty() {
        return Err(PemError::Empty);
    }

    let begin = key.find(BEGIN_MARKER).ok_or(PemError::MissingHeader)?;
    let after_begin = &key[begin + BEGIN_MARKER.len()..];
    let label_end = after_begin.find(DASHES).ok_or(PemError::MissingHeader)?;
    let label = after_begin[..label_end]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if label.is_empty() {
        return Err(PemError::MissingHeader);
    }

    let rest = &after_begin[label_end + DASHES.len()..];
    let end = rest
        .find(END_MARKER)
        .ok_or_else(|| PemError::MissingFooter(label.clone()))?;

    let body = pad_base64(&clean_base64(&rest[..end]))?;
    STANDARD
        .decode(&body)
        .map_err(|e| PemError::InvalidBase64(e.to_string()))?;

    Ok(wrap_pem(&label, &body))
}

/// Keeps only characters of the standard base64 alphabet, dropping padding.
fn clean_base64(body: &str) -> String {
    body.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/')
        .collect()
}

fn pad_base64(body: &str) -> Result<String, PemError> {
    if body.is_empty() {
        return Err(PemError::EmptyBody);
    }

    match body.len() % 4 {
        0 => Ok(body.to_string()),
        1 => Err(PemError::InvalidBase64(format!(
            "{} base64 characters cannot encode whole bytes",
            body.len()
        ))),
        rem => Ok(format!("{body}{}", "=".repeat(4 - rem))),
    }
}

fn wrap_pem(label: &str, body: &str) -> String {
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(&format!("-----BEGIN {label}-----\n"));
    // The body is pure ASCII, so byte chunks are valid UTF-8.
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}
