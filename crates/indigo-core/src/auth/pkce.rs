//! PKCE (RFC 7636) verifier and S256 challenge

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random code verifier, kept until the authorization code is exchanged
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// 64 random bytes, base64url without padding (86 characters).
    pub fn new() -> Self {
        let mut bytes = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `base64url(sha256(verifier))`
    pub fn challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.0.as_bytes()))
    }

    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Random value echoed back by the callback, checked against CSRF.
pub fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_shape() {
        let verifier = PkceVerifier::new();
        assert!((43..=128).contains(&verifier.as_str().len()));
        assert_ne!(verifier.as_str(), PkceVerifier::new().as_str());
        assert_eq!(verifier.challenge(), verifier.challenge());
        assert_eq!(verifier.challenge().len(), 43);
    }

    #[test]
    fn test_rfc7636_vector() {
        let verifier = PkceVerifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into());
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_state_is_random() {
        assert_ne!(random_state(), random_state());
    }
}
