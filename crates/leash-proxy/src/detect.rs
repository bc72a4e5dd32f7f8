//! Byte-level sniffing of the first bytes of a freshly accepted connection,
//! used to tell a TLS `ClientHello` apart from plaintext HTTP before the
//! proxy decides whether to terminate TLS or forward bytes untouched.

/// What the first bytes of a connection look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// A TLS handshake record (`CONNECT` tunnel carrying TLS).
    Tls,
    /// Plaintext HTTP request bytes.
    PlainHttp,
    /// Not enough bytes were available to classify.
    Unknown,
}

/// TLS record type for a handshake, per RFC 8446 §5.1.
const TLS_HANDSHAKE_RECORD: u8 = 0x16;

/// Classify a connection from its first few bytes.
///
/// A TLS `ClientHello` always opens with the handshake content type
/// (`0x16`) followed by a two-byte legacy version whose major byte is
/// `0x03`. Anything else made of printable ASCII is treated as plaintext
/// HTTP; an empty buffer is unknown.
#[must_use]
pub fn classify(prefix: &[u8]) -> ConnectionKind {
    match prefix.first() {
        None => ConnectionKind::Unknown,
        Some(&TLS_HANDSHAKE_RECORD) if prefix.get(1) == Some(&0x03) => ConnectionKind::Tls,
        Some(b) if b.is_ascii_alphabetic() => ConnectionKind::PlainHttp,
        Some(_) => ConnectionKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_tls_client_hello_prefix() {
        assert_eq!(classify(&[0x16, 0x03, 0x01, 0x00, 0xa0]), ConnectionKind::Tls);
    }

    #[test]
    fn recognizes_plaintext_http_methods() {
        assert_eq!(classify(b"GET / HTTP/1.1\r\n"), ConnectionKind::PlainHttp);
        assert_eq!(classify(b"POST /x HTTP/1.1\r\n"), ConnectionKind::PlainHttp);
    }

    #[test]
    fn empty_prefix_is_unknown() {
        assert_eq!(classify(&[]), ConnectionKind::Unknown);
    }
}
