use keyforge::{Algorithm, KeyforgeError, ParseOptions, PrivateKey, SignatureEncoding};
use rstest::rstest;

macro_rules! fixture {
    ($name:literal) => {
        include_bytes!(concat!("fixtures/", $name)).as_slice()
    };
}

const MESSAGE: &[u8] = fixture!("message.txt");

fn private(data: &[u8]) -> PrivateKey {
    PrivateKey::parse(data, "auto", ParseOptions::default()).unwrap()
}

#[rstest(key, hash, signature,
    case(fixture!("rsa_pkcs1.pem"), "sha256", fixture!("rsa_sha256.sig")),
    case(fixture!("rsa_pkcs1.pem"), "sha1", fixture!("rsa_sha1.sig")),
    case(fixture!("rsa_pkcs1.pem"), "sha1-2", fixture!("rsa_sha1.sig")),
    case(fixture!("ec256_sec1.pem"), "sha256", fixture!("ec256_sha256.sig")),
    case(fixture!("dsa_openssl.pem"), "sha1", fixture!("dsa_sha1.sig")),
)]
fn test_verify_openssl_signatures(key: &[u8], hash: &str, signature: &[u8]) {
    let key = private(key);
    let mut verifier = key.create_verify(hash).unwrap();
    verifier.update(MESSAGE);
    assert!(verifier.verify(signature, SignatureEncoding::Asn1).unwrap());

    let mut verifier = key.create_verify(hash).unwrap();
    verifier.update(b"keyforge test message\r\n");
    assert!(!verifier.verify(signature, SignatureEncoding::Asn1).unwrap());
}

#[test]
fn test_verify_in_chunks() {
    let key = private(fixture!("rsa_openssh"));
    let mut verifier = key.to_public().create_verify("sha256").unwrap();
    for chunk in MESSAGE.chunks(5) {
        verifier.update(chunk);
    }
    assert!(verifier
        .verify(fixture!("rsa_sha256.sig"), SignatureEncoding::Asn1)
        .unwrap());
}

#[rstest(hash, expected,
    case("sha256", fixture!("rsa_sha256.sig")),
    case("sha1", fixture!("rsa_sha1.sig")),
)]
fn test_rsa_signatures_are_deterministic(hash: &str, expected: &[u8]) {
    let key = private(fixture!("rsa_pkcs1.pem"));
    let signature = key.create_sign(hash).unwrap().update(MESSAGE).sign().unwrap();
    assert_eq!(signature.to_bytes(SignatureEncoding::Asn1).unwrap(), expected);
}

#[test]
fn test_ed25519_matches_reference_signature() {
    let key = private(fixture!("ed25519_openssh"));
    let mut signer = key.create_sign("sha512").unwrap();
    signer.update("keyforge test ").update("message\n");
    let signature = signer.sign().unwrap();
    assert_eq!(signature.to_bytes(SignatureEncoding::Raw).unwrap(), fixture!("ed25519.sig"));

    let mut verifier = key.create_verify("SHA512").unwrap();
    verifier.update(MESSAGE);
    assert!(verifier.verify(&signature, SignatureEncoding::Raw).unwrap());
    assert!(verifier.verify(fixture!("ed25519.sig"), SignatureEncoding::Raw).unwrap());
}

#[test]
fn test_ed25519_verifies_base64_text() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let key = private(fixture!("ed25519_openssh"));
    let text = STANDARD.encode(fixture!("ed25519.sig"));
    let mut verifier = key.create_verify("sha512").unwrap();
    verifier.update(MESSAGE);
    assert!(verifier.verify(text.as_str(), SignatureEncoding::Raw).unwrap());
}

#[rstest(hash, case("sha256"), case("sha1"), case(""))]
fn test_ed25519_requires_sha512(hash: &str) {
    let key = private(fixture!("ed25519_openssh"));
    assert!(matches!(
        key.create_sign(hash),
        Err(KeyforgeError::Ed25519HashRequired(_))
    ));
    assert!(matches!(
        key.create_verify(hash),
        Err(KeyforgeError::Ed25519HashRequired(_))
    ));
}

#[rstest(key, hash,
    case(fixture!("ec256_pkcs8.pem"), "sha256"),
    case(fixture!("ecdsa384_openssh"), "sha384"),
    case(fixture!("dsa_pkcs8.pem"), "sha1"),
    case(fixture!("rsa_pkcs8.pem"), "sha512"),
    case(fixture!("ed25519_openssh"), "sha512"),
)]
fn test_sign_then_verify_each_encoding(key: &[u8], hash: &str) {
    let key = private(key);
    let signature = key.create_sign(hash).unwrap().update(MESSAGE).sign().unwrap();

    for encoding in [SignatureEncoding::Asn1, SignatureEncoding::Ssh] {
        let bytes = signature.to_bytes(encoding).unwrap();
        let mut verifier = key.create_verify(hash).unwrap();
        verifier.update(MESSAGE);
        assert!(verifier.verify(&bytes[..], encoding).unwrap(), "{encoding:?}");
    }
}

#[test]
fn test_signature_object_with_other_hash_fails() {
    let key = private(fixture!("rsa_pkcs1.pem"));
    let signature = key.create_sign("sha256").unwrap().update(MESSAGE).sign().unwrap();

    let mut verifier = key.create_verify("sha1").unwrap();
    verifier.update(MESSAGE);
    assert!(!verifier.verify(&signature, SignatureEncoding::Asn1).unwrap());
}

#[test]
fn test_signature_from_other_key_fails() {
    let signer = private(fixture!("ec256_sec1.pem"));
    let other = private(fixture!("ecdsa256_openssh"));
    let signature = signer.create_sign("sha256").unwrap().update(MESSAGE).sign().unwrap();

    let mut verifier = other.create_verify("sha256").unwrap();
    verifier.update(MESSAGE);
    assert!(!verifier.verify(&signature, SignatureEncoding::Asn1).unwrap());
}

#[test]
fn test_signer_can_sign_twice() {
    let key = private(fixture!("rsa_pkcs1.pem"));
    let mut signer = key.create_sign("sha256").unwrap();
    signer.update(MESSAGE);
    let first = signer.sign().unwrap();
    let second = signer.sign().unwrap();
    assert_eq!(
        first.to_bytes(SignatureEncoding::Asn1).unwrap(),
        second.to_bytes(SignatureEncoding::Asn1).unwrap()
    );
}

#[test]
fn test_curve25519_cannot_sign() {
    let key = private(fixture!("x25519_pkcs8.pem"));
    assert_eq!(key.algorithm(), Algorithm::Curve25519);
    assert!(matches!(key.create_sign("sha512"), Err(KeyforgeError::NotSigningKey)));
}

#[test]
fn test_unknown_hash() {
    let key = private(fixture!("rsa_pkcs1.pem"));
    assert!(matches!(
        key.create_sign("md4"),
        Err(KeyforgeError::InvalidAlgorithm { .. })
    ));
}
