//! PKCE Engine (spec.md §4.2) — S256 only. `plain` is rejected
//! unconditionally, matching the teacher's `PkceCodeChallenge` pattern in
//! spirit but with the exact verification semantics IndieAuth requires.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 32 cryptographically random bytes, base64url without padding (43
/// chars).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `base64url(sha256(ascii(verifier)))`, no padding.
pub fn compute_challenge_s256(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn is_valid_verifier_alphabet(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Returns true iff `method == "S256"`, the verifier has a legal length and
/// alphabet, and `computeChallengeS256(verifier)` equals `challenge` under
/// constant-time comparison.
pub fn verify(verifier: &str, challenge: &str, method: &str) -> bool {
    if method != "S256" {
        return false;
    }
    if !is_valid_verifier_alphabet(verifier) {
        return false;
    }
    let computed = compute_challenge_s256(verifier);
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc7636_b1_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let expected = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert_eq!(compute_challenge_s256(verifier), expected);
        assert!(verify(verifier, expected, "S256"));
    }

    #[test]
    fn round_trip_generated_verifier() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 43);
        let challenge = compute_challenge_s256(&verifier);
        assert!(verify(&verifier, &challenge, "S256"));
    }

    #[test]
    fn plain_method_always_rejected() {
        let verifier = generate_verifier();
        let challenge = compute_challenge_s256(&verifier);
        assert!(!verify(&verifier, &challenge, "plain"));
    }

    #[test]
    fn length_boundaries() {
        let verifier_42 = "a".repeat(42);
        let verifier_43 = "a".repeat(43);
        let verifier_128 = "a".repeat(128);
        let verifier_129 = "a".repeat(129);
        assert!(!is_valid_verifier_alphabet(&verifier_42));
        assert!(is_valid_verifier_alphabet(&verifier_43));
        assert!(is_valid_verifier_alphabet(&verifier_128));
        assert!(!is_valid_verifier_alphabet(&verifier_129));
    }

    #[test]
    fn mismatched_challenge_fails() {
        let verifier = generate_verifier();
        assert!(!verify(&verifier, "not-the-right-challenge", "S256"));
    }
}
