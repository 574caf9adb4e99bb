use std::{fmt, str::FromStr};

use hmac::{digest::KeyInit, Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use thiserror::Error;
use tracing::trace;

/// Header carrying the HMAC hexdigest, e.g. `sha256=4f0c...`.
pub const X_HUB_SIGNATURE: &str = "X-Hub-Signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("request has no X-Hub-Signature header")]
    Missing,
    #[error("malformed signature: {0}")]
    Malformed(&'static str),
    #[error("unknown signature algorithm `{0}`")]
    UnknownAlgorithm(String),
    #[error("payload signature check failed")]
    Mismatch,
}

/// Hash functions Bitbucket Server may sign with. It only emits `sha1` today, the other two
/// are accepted so that a server upgrade doesn't break receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Sha1, Algorithm::Sha256, Algorithm::Sha512];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Length in bytes of the digest this algorithm produces.
    pub fn digest_len(self) -> usize {
        match self {
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 => 32,
            Algorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == s)
            .ok_or_else(|| SignatureError::UnknownAlgorithm(s.to_owned()))
    }
}

/// A parsed `<algorithm>=<hex-digest>` header value.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    pub algorithm: Algorithm,
    pub digest: Vec<u8>,
}

// digests stay out of logs
impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        if header.is_empty() {
            return Err(SignatureError::Missing);
        }

        let (prefix, hex_digest) = header
            .split_once('=')
            .ok_or(SignatureError::Malformed("missing `=` separator"))?;
        let algorithm: Algorithm = prefix.parse()?;

        let digest = hex::decode(hex_digest).map_err(|_| {
            trace!("couldn't decode hex-encoded {} signature", algorithm);
            SignatureError::Malformed("digest is not valid hex")
        })?;
        if digest.len() != algorithm.digest_len() {
            trace!(
                "{} digest has {} bytes, expected {}",
                algorithm,
                digest.len(),
                algorithm.digest_len()
            );
            return Err(SignatureError::Malformed("digest length doesn't match algorithm"));
        }

        Ok(Signature { algorithm, digest })
    }
}

impl Signature {
    /// Checks the digest against the HMAC of `payload` under `secret`, in constant time.
    pub fn verify(&self, payload: &[u8], secret: &[u8]) -> Result<(), SignatureError> {
        let matches = match self.algorithm {
            Algorithm::Sha1 => check_mac::<Hmac<Sha1>>(secret, payload, &self.digest),
            Algorithm::Sha256 => check_mac::<Hmac<Sha256>>(secret, payload, &self.digest),
            Algorithm::Sha512 => check_mac::<Hmac<Sha512>>(secret, payload, &self.digest),
        };

        if matches {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn check_mac<M: Mac + KeyInit>(secret: &[u8], payload: &[u8], expected: &[u8]) -> bool {
    // HMAC accepts keys of any length
    let mut mac = match <M as KeyInit>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(expected).is_ok()
}

fn gen_mac<M: Mac + KeyInit>(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = <M as KeyInit>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Verifies `payload` against the value of the [`X_HUB_SIGNATURE`] header.
pub fn verify(
    signature: Option<&str>,
    payload: &[u8],
    secret: &[u8],
) -> Result<(), SignatureError> {
    trace!("validating signature...");
    let signature: Signature = signature.ok_or(SignatureError::Missing)?.parse()?;
    signature.verify(payload, secret)
}

/// Produces the header value Bitbucket Server would send for `payload`.
pub fn sign(algorithm: Algorithm, payload: &[u8], secret: &[u8]) -> String {
    let digest = match algorithm {
        Algorithm::Sha1 => gen_mac::<Hmac<Sha1>>(secret, payload),
        Algorithm::Sha256 => gen_mac::<Hmac<Sha256>>(secret, payload),
        Algorithm::Sha512 => gen_mac::<Hmac<Sha512>>(secret, payload),
    };
    format!("{}={}", algorithm, hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = br#"{"eventKey":"repo:refs_changed","changes":[]}"#;

    #[test]
    fn fresh_signatures_verify_for_every_algorithm() {
        for algorithm in Algorithm::ALL {
            let header = sign(algorithm, PAYLOAD, b"topsecret");
            assert!(header.starts_with(&format!("{}=", algorithm)));
            assert_eq!(verify(Some(header.as_str()), PAYLOAD, b"topsecret"), Ok(()));
        }
    }

    #[test]
    fn known_sha1_digest() {
        // RFC 2202 test case 2
        let header = sign(Algorithm::Sha1, b"what do ya want for nothing?", b"Jefe");
        assert_eq!(header, "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn any_flipped_bit_is_a_mismatch() {
        for algorithm in Algorithm::ALL {
            let header = sign(algorithm, PAYLOAD, b"topsecret");
            let signature: Signature = header.parse().unwrap();

            for byte in 0..signature.digest.len() {
                for bit in 0..8 {
                    let mut tampered = signature.clone();
                    tampered.digest[byte] ^= 1 << bit;
                    let header = format!("{}={}", algorithm, hex::encode(&tampered.digest));
                    assert_eq!(
                        verify(Some(header.as_str()), PAYLOAD, b"topsecret"),
                        Err(SignatureError::Mismatch)
                    );
                }
            }
        }
    }

    #[test]
    fn wrong_secret_or_payload_is_a_mismatch() {
        let header = sign(Algorithm::Sha256, PAYLOAD, b"topsecret");
        assert_eq!(
            verify(Some(header.as_str()), PAYLOAD, b"other"),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify(Some(header.as_str()), b"{}", b"topsecret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn missing_signature() {
        assert_eq!(verify(None, PAYLOAD, b"s"), Err(SignatureError::Missing));
        assert_eq!(verify(Some(""), PAYLOAD, b"s"), Err(SignatureError::Missing));
    }

    #[test]
    fn unknown_algorithm() {
        assert_eq!(
            verify(Some("md5=deadbeef"), PAYLOAD, b"s"),
            Err(SignatureError::UnknownAlgorithm("md5".to_owned()))
        );
        // tags are matched exactly
        assert!(matches!(
            verify(Some("SHA1=00"), PAYLOAD, b"s"),
            Err(SignatureError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn malformed_signatures() {
        for header in ["sha1", "sha1=not-hex", "sha256=abc", "sha1=deadbeef"] {
            assert!(
                matches!(
                    verify(Some(header), PAYLOAD, b"s"),
                    Err(SignatureError::Malformed(_))
                ),
                "{} should be malformed",
                header
            );
        }
    }

    #[test]
    fn splits_on_first_separator_only() {
        let err = verify(Some("sha1=ab=cd"), PAYLOAD, b"s").unwrap_err();
        assert_eq!(err, SignatureError::Malformed("digest is not valid hex"));
    }

    #[test]
    fn errors_and_debug_never_show_digests() {
        let header = sign(Algorithm::Sha1, PAYLOAD, b"topsecret");
        let hex_digest = header.strip_prefix("sha1=").unwrap();
        let signature: Signature = header.parse().unwrap();
        assert!(!format!("{:?}", signature).contains(hex_digest));

        let err = verify(Some("sha1=zz"), PAYLOAD, b"topsecret").unwrap_err();
        assert!(!err.to_string().contains("zz"));
    }
}
