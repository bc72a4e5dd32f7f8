//! Secret-placeholder substitution over outbound request bodies (spec.md
//! §4.6 step 4, §4.7): every occurrence of a vault placeholder is replaced
//! with its real secret value before the request leaves the proxy, with
//! transparent support for the compressed encodings an agent's HTTP client
//! might use.
//!
//! Substitution operates on the whole buffered body rather than an
//! incremental byte stream. `[SIMPLIFICATION]`: see DESIGN.md — placeholder
//! occurrences can straddle arbitrary byte boundaries, so a streaming
//! implementation would need its own reassembly buffer anyway; most MITM
//! proxies bound body size and operate on the whole buffer for exactly this
//! reason.

use std::io::{Read, Write};

use leash_secrets::SecretVault;

/// Default cap on a request body eligible for substitution. Bodies larger
/// than this pass through unmodified rather than risk unbounded memory use
/// for a single request.
pub const MAX_SUBSTITUTION_BYTES: usize = 16 * 1024 * 1024;

/// The `Content-Encoding` a body is framed with, as far as substitution
/// cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// No content coding.
    Identity,
    /// `gzip`.
    Gzip,
    /// `deflate` (zlib).
    Deflate,
    /// `br` (Brotli).
    Brotli,
}

impl Encoding {
    /// Parse a `Content-Encoding` header value.
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            "br" => Self::Brotli,
            _ => Self::Identity,
        }
    }
}

/// Substitute every placeholder known to `vault` inside `body`, decoding
/// and re-encoding `body` around the substitution if it carries a
/// compressed `encoding`. Returns the rewritten body, or the original body
/// unchanged if it exceeds [`MAX_SUBSTITUTION_BYTES`] once decoded, or if
/// decoding fails (a body the proxy cannot safely rewrite is forwarded
/// as-is rather than dropped).
pub fn substitute_body(vault: &SecretVault, body: &[u8], encoding: Encoding) -> Vec<u8> {
    let placeholders = vault.placeholders();
    if placeholders.is_empty() {
        return body.to_vec();
    }

    let Some(decoded) = decode(body, encoding) else {
        return body.to_vec();
    };
    if decoded.len() > MAX_SUBSTITUTION_BYTES {
        return body.to_vec();
    }

    let Ok(text) = String::from_utf8(decoded) else {
        return body.to_vec();
    };

    let mut rewritten = text;
    let mut any_hit = false;
    for (placeholder, value) in &placeholders {
        if rewritten.contains(placeholder.as_str()) {
            any_hit = true;
            let occurrences = rewritten.matches(placeholder.as_str()).count();
            rewritten = rewritten.replace(placeholder.as_str(), value);
            for _ in 0..occurrences {
                vault.inc_activations_by_placeholder(placeholder);
            }
        }
    }

    if !any_hit {
        return body.to_vec();
    }

    encode(rewritten.into_bytes(), encoding).unwrap_or_else(|| body.to_vec())
}

fn decode(body: &[u8], encoding: Encoding) -> Option<Vec<u8>> {
    match encoding {
        Encoding::Identity => Some(body.to_vec()),
        Encoding::Gzip => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(body).read_to_end(&mut out).ok()?;
            Some(out)
        }
        Encoding::Deflate => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(body).read_to_end(&mut out).ok()?;
            Some(out)
        }
        Encoding::Brotli => {
            let mut out = Vec::new();
            brotli::Decompressor::new(body, 4096).read_to_end(&mut out).ok()?;
            Some(out)
        }
    }
}

fn encode(body: Vec<u8>, encoding: Encoding) -> Option<Vec<u8>> {
    match encoding {
        Encoding::Identity => Some(body),
        Encoding::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&body).ok()?;
            encoder.finish().ok()
        }
        Encoding::Deflate => {
            let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&body).ok()?;
            encoder.finish().ok()
        }
        Encoding::Brotli => {
            let mut out = Vec::new();
            let params = brotli::enc::BrotliEncoderParams::default();
            brotli::BrotliCompress(&mut &body[..], &mut out, &params).ok()?;
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholder_in_plain_body() {
        let vault = SecretVault::new();
        let placeholder = vault.create("github-token", "ghp_real").unwrap();
        let body = format!("Authorization: Bearer {placeholder}");

        let rewritten = substitute_body(&vault, body.as_bytes(), Encoding::Identity);
        assert_eq!(String::from_utf8(rewritten).unwrap(), "Authorization: Bearer ghp_real");

        let entry = vault.fetch("github-token").unwrap();
        assert_eq!(entry.activations, 1);
    }

    #[test]
    fn leaves_body_untouched_when_no_placeholder_present() {
        let vault = SecretVault::new();
        vault.create("github-token", "ghp_real").unwrap();
        let body = b"nothing interesting here".to_vec();

        let rewritten = substitute_body(&vault, &body, Encoding::Identity);
        assert_eq!(rewritten, body);
    }

    #[test]
    fn substitutes_inside_gzip_compressed_body() {
        let vault = SecretVault::new();
        let placeholder = vault.create("api-key", "sk-real-value").unwrap();
        let plain = format!("key={placeholder}");

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(plain.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let rewritten = substitute_body(&vault, &compressed, Encoding::Gzip);
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(&rewritten[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "key=sk-real-value");
    }
}
