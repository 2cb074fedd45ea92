#![allow(clippy::unwrap_used, clippy::expect_used)]

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    credvault_config::{Environment, KeyMaterial},
    credvault_vault::{
        EnvelopeCodec, KEY_LEN, KeyRegistry, VaultError, is_versioned, version_of,
    },
    rstest::rstest,
};

const S1: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const S2: &str = "2222222222222222222222222222222222222222222222222222222222222222";

const SALT_LEN: usize = 64;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

fn registry(pairs: &[(u32, &str)]) -> KeyRegistry {
    KeyRegistry::new(
        KeyMaterial::from_pairs(pairs.iter().copied()),
        Environment::Production,
    )
}

/// Flip one bit of the decoded envelope body at `offset` and re-encode.
fn flip_bit(wire: &str, offset: usize) -> String {
    let (prefix, body) = wire.split_once(':').unwrap();
    let mut raw = STANDARD.decode(body).unwrap();
    raw[offset] ^= 0x01;
    format!("{prefix}:{}", STANDARD.encode(raw))
}

#[test]
fn rotation_scenario_across_two_key_generations() {
    let codec = EnvelopeCodec::new();

    let v1_only = registry(&[(1, S1)]);
    let e1 = codec.encrypt("hello", &v1_only).unwrap();
    assert_eq!(version_of(&e1), 1);

    let both = registry(&[(1, S1), (2, S2)]);
    assert_eq!(codec.decrypt(&e1, &both).unwrap(), "hello");

    let e2 = codec.reencrypt(&e1, &both, Some(2)).unwrap();
    assert_eq!(version_of(&e2), 2);
    assert_eq!(codec.decrypt(&e2, &both).unwrap(), "hello");

    let v2_only = registry(&[(2, S2)]);
    assert_eq!(codec.decrypt(&e2, &v2_only).unwrap(), "hello");
    assert!(matches!(
        codec.decrypt(&e1, &v2_only),
        Err(VaultError::KeyNotFound { version: 1 })
    ));
}

#[test]
fn encrypt_tags_with_latest_version() {
    let codec = EnvelopeCodec::new();
    let reg = registry(&[(1, S1), (4, S2)]);
    let wire = codec.encrypt("token", &reg).unwrap();
    assert!(is_versioned(&wire));
    assert_eq!(version_of(&wire), 4);
}

#[test]
fn untagged_legacy_envelope_decrypts_with_version_one() {
    let codec = EnvelopeCodec::new();
    let reg = registry(&[(1, S1), (2, S2)]);
    let tagged = codec.encrypt_with_version("legacy-refresh", &reg, 1).unwrap();
    let legacy = tagged.strip_prefix("v1:").unwrap();

    assert!(!is_versioned(legacy));
    assert_eq!(version_of(legacy), 1);
    assert_eq!(codec.decrypt(legacy, &reg).unwrap(), "legacy-refresh");
}

#[test]
fn legacy_envelope_without_version_one_key_is_key_not_found() {
    let codec = EnvelopeCodec::new();
    let full = registry(&[(1, S1), (2, S2)]);
    let tagged = codec.encrypt_with_version("x", &full, 1).unwrap();
    let legacy = tagged.strip_prefix("v1:").unwrap();

    let v2_only = registry(&[(2, S2)]);
    assert!(matches!(
        codec.decrypt(legacy, &v2_only),
        Err(VaultError::KeyNotFound { version: 1 })
    ));
}

#[rstest]
#[case::first_tag_byte(SALT_LEN + NONCE_LEN)]
#[case::last_tag_byte(SALT_LEN + NONCE_LEN + TAG_LEN - 1)]
#[case::first_ciphertext_byte(SALT_LEN + NONCE_LEN + TAG_LEN)]
#[case::last_ciphertext_byte(SALT_LEN + NONCE_LEN + TAG_LEN + 20)]
fn tampering_is_detected(#[case] offset: usize) {
    let codec = EnvelopeCodec::new();
    let reg = registry(&[(1, S1)]);
    // 21-byte plaintext so the last ciphertext byte sits at offset 96 + 20.
    let wire = codec.encrypt("access-token-abcdefgh", &reg).unwrap();
    let tampered = flip_bit(&wire, offset);

    assert!(matches!(
        codec.decrypt(&tampered, &reg),
        Err(VaultError::Decryption { .. })
    ));
}

#[test]
fn wrong_key_for_version_fails_authentication() {
    let codec = EnvelopeCodec::new();
    let wire = codec.encrypt("hello", &registry(&[(1, S1)])).unwrap();
    let impostor = registry(&[(1, S2)]);
    assert!(matches!(
        codec.decrypt(&wire, &impostor),
        Err(VaultError::Decryption { .. })
    ));
}

#[rstest]
#[case("v1:")]
#[case("v1:AAAA")]
#[case("not base64 at all")]
fn malformed_envelopes_are_decryption_errors(#[case] wire: &str) {
    let codec = EnvelopeCodec::new();
    let reg = registry(&[(1, S1)]);
    assert!(matches!(
        codec.decrypt(wire, &reg),
        Err(VaultError::Decryption { .. })
    ));
}

#[test]
fn every_encryption_uses_fresh_salt_and_nonce() {
    let codec = EnvelopeCodec::new();
    let reg = registry(&[(1, S1)]);
    let a = codec.encrypt("same", &reg).unwrap();
    let b = codec.encrypt("same", &reg).unwrap();
    assert_ne!(a, b);

    let raw_a = STANDARD.decode(a.strip_prefix("v1:").unwrap()).unwrap();
    let raw_b = STANDARD.decode(b.strip_prefix("v1:").unwrap()).unwrap();
    assert_ne!(raw_a[..SALT_LEN], raw_b[..SALT_LEN]);
    assert_ne!(
        raw_a[SALT_LEN..SALT_LEN + NONCE_LEN],
        raw_b[SALT_LEN..SALT_LEN + NONCE_LEN]
    );
}

#[test]
fn development_registry_round_trips() {
    let codec = EnvelopeCodec::new();
    let reg = KeyRegistry::new(KeyMaterial::default(), Environment::Development);
    let wire = codec.encrypt("dev", &reg).unwrap();
    assert_eq!(codec.decrypt(&wire, &reg).unwrap(), "dev");
    assert!(reg.uses_development_key().unwrap());
}

#[test]
fn concurrent_encryption_shares_one_registry() {
    let reg = std::sync::Arc::new(KeyRegistry::from_secrets([(1, [5u8; KEY_LEN])]).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let reg = std::sync::Arc::clone(&reg);
            std::thread::spawn(move || {
                let codec = EnvelopeCodec::new();
                let plain = format!("token-{i}");
                let wire = codec.encrypt(&plain, &reg).unwrap();
                codec.decrypt(&wire, &reg).unwrap() == plain
            })
        })
        .collect();
    assert!(handles.into_iter().all(|h| h.join().unwrap()));
}
