//! Versioned envelope wire format.
//!
//! `v<N>:` followed by standard base64 of `salt(64) || nonce(16) || tag(16) || ciphertext`.
//! Values without a `v<N>:` tag are legacy envelopes and belong to version 1.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{
    error::{Result, VaultError},
    traits::{NONCE_LEN, TAG_LEN},
};

/// Random salt stored in every envelope. Not consumed by the cipher today,
/// kept so a future key-derivation step has per-value input.
pub const SALT_LEN: usize = 64;

/// Version implied by an untagged envelope.
pub const LEGACY_VERSION: u32 = 1;

const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// One encrypted value, decoded from (or ready to encode into) its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u32,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parse a full wire string, tagged or legacy.
    pub fn parse(wire: &str) -> Result<Self> {
        let (version, body) = split_prefix(wire);
        Self::decode_body(version, body)
    }

    /// Decode the base64 body of an envelope whose version is already known.
    pub fn decode_body(version: u32, body: &str) -> Result<Self> {
        let bytes = STANDARD.decode(body.trim())?;
        if bytes.len() < HEADER_LEN {
            return Err(VaultError::decryption(format!(
                "envelope too short: {} bytes (need at least {HEADER_LEN})",
                bytes.len()
            )));
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut envelope = Self {
            version,
            salt: [0u8; SALT_LEN],
            nonce: [0u8; NONCE_LEN],
            tag: [0u8; TAG_LEN],
            ciphertext: ciphertext.to_vec(),
        };
        envelope.salt.copy_from_slice(salt);
        envelope.nonce.copy_from_slice(nonce);
        envelope.tag.copy_from_slice(tag);
        Ok(envelope)
    }

    /// Encode to the tagged wire form. Always writes the `v<N>:` prefix.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.salt);
        raw.extend_from_slice(&self.nonce);
        raw.extend_from_slice(&self.tag);
        raw.extend_from_slice(&self.ciphertext);
        format!("v{}:{}", self.version, STANDARD.encode(raw))
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Split an optional `v<digits>:` tag from the base64 body.
///
/// Base64 never contains `:`, so a leading `v` alone is not mistaken for a tag.
pub fn split_prefix(wire: &str) -> (u32, &str) {
    parse_tag(wire).unwrap_or((LEGACY_VERSION, wire))
}

fn parse_tag(wire: &str) -> Option<(u32, &str)> {
    let rest = wire.strip_prefix('v')?;
    let (digits, body) = rest.split_once(':')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, body))
}

/// Version of an envelope from its prefix alone. No decoding or decryption.
#[must_use]
pub fn version_of(wire: &str) -> u32 {
    split_prefix(wire).0
}

/// Whether the value carries an explicit `v<N>:` tag.
#[must_use]
pub fn is_versioned(wire: &str) -> bool {
    parse_tag(wire).is_some()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn sample(version: u32) -> Envelope {
        Envelope {
            version,
            salt: [0x11; SALT_LEN],
            nonce: [0x22; NONCE_LEN],
            tag: [0x33; TAG_LEN],
            ciphertext: b"ciphertext".to_vec(),
        }
    }

    #[rstest]
    #[case("v1:AAAA", 1)]
    #[case("v2:AAAA", 2)]
    #[case("v10:AAAA", 10)]
    #[case("AAAA", 1)]
    #[case("vGVzdA==", 1)]
    #[case("v:AAAA", 1)]
    #[case("vx2:AAAA", 1)]
    #[case("", 1)]
    fn version_from_prefix(#[case] wire: &str, #[case] expected: u32) {
        assert_eq!(version_of(wire), expected);
    }

    #[test]
    fn tagged_detection() {
        assert!(is_versioned("v3:AAAA"));
        assert!(!is_versioned("AAAA"));
        assert!(!is_versioned("v:AAAA"));
        assert!(!is_versioned("v99999999999:AAAA"));
    }

    #[test]
    fn encode_parse_preserves_layout() {
        let env = sample(4);
        let wire = env.encode();
        assert!(wire.starts_with("v4:"));

        let raw = STANDARD.decode(&wire[3..]).unwrap();
        assert_eq!(&raw[..SALT_LEN], &[0x11; SALT_LEN]);
        assert_eq!(&raw[SALT_LEN..SALT_LEN + NONCE_LEN], &[0x22; NONCE_LEN]);
        assert_eq!(&raw[HEADER_LEN - TAG_LEN..HEADER_LEN], &[0x33; TAG_LEN]);
        assert_eq!(&raw[HEADER_LEN..], b"ciphertext");

        assert_eq!(Envelope::parse(&wire).unwrap(), env);
    }

    #[test]
    fn untagged_body_parses_as_version_one() {
        let wire = sample(7).encode();
        let body = wire.split_once(':').unwrap().1;
        let parsed = Envelope::parse(body).unwrap();
        assert_eq!(parsed.version, LEGACY_VERSION);
        assert_eq!(parsed.ciphertext, b"ciphertext");
    }

    #[test]
    fn display_matches_encode() {
        let env = sample(2);
        assert_eq!(env.to_string(), env.encode());
    }

    #[test]
    fn short_body_is_decryption_error() {
        let short = STANDARD.encode([0u8; HEADER_LEN - 1]);
        let err = Envelope::parse(&format!("v1:{short}")).unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn invalid_base64_is_decryption_error() {
        let err = Envelope::parse("v1:not base64!!").unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn header_only_envelope_has_empty_ciphertext() {
        let body = STANDARD.encode([0u8; HEADER_LEN]);
        let env = Envelope::parse(&body).unwrap();
        assert!(env.ciphertext.is_empty());
    }
}
