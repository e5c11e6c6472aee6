//! Signing key provisioning.
//!
//! The key is loaded exactly once at startup and then shared read-only as
//! `Arc<SigningKey>`. Loading prefers the operator-supplied environment
//! variable and falls back to a key file for local development. Any problem
//! is a [`KeyError`]: the process must refuse to start rather than serve
//! requests it cannot sign or verify.
//!
//! # Key formats
//!
//! | Algorithm | Accepted material |
//! |-----------|-------------------|
//! | `EdDSA`   | PKCS#8 PEM with the label `PRIVATE KEY` holding an Ed25519 key |
//! | `HS256`   | Raw secret of at least 32 bytes (anything that is not PEM) |

use std::{
    fmt,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{config::SigningKeyConfig, error::KeyError};

/// Minimum HS256 secret length, matching the SHA-256 output size.
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// PEM label required for Ed25519 private keys.
const PKCS8_PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Supported token signing algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// Ed25519 signatures (asymmetric).
    #[default]
    #[serde(rename = "EdDSA")]
    EdDsa,
    /// HMAC-SHA256 (symmetric).
    #[serde(rename = "HS256")]
    Hs256,
}

impl KeyAlgorithm {
    /// The matching `jsonwebtoken` algorithm.
    #[must_use]
    pub fn jwt_algorithm(self) -> Algorithm {
        match self {
            Self::EdDsa => Algorithm::EdDSA,
            Self::Hs256 => Algorithm::HS256,
        }
    }

    /// The `alg` header value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EdDsa => "EdDSA",
            Self::Hs256 => "HS256",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a loaded key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Read from the named environment variable.
    Environment(String),
    /// Read from a key file.
    File(PathBuf),
    /// Supplied directly by the caller.
    Inline,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment(name) => write!(f, "env:{name}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Inline => f.write_str("inline"),
        }
    }
}

/// Process-wide signing key material.
///
/// Holds the encoding and decoding halves for one algorithm. `Debug` output
/// never contains key material.
pub struct SigningKey {
    algorithm: KeyAlgorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    source: KeySource,
}

impl SigningKey {
    /// Loads the key described by `config` from the process environment or
    /// the key file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if no source yields a key of the configured type.
    pub fn load(config: &SigningKeyConfig) -> Result<Self, KeyError> {
        Self::load_with_env(config, |name| std::env::var(name).ok())
    }

    /// Like [`load`](Self::load), reading environment variables through `env`.
    ///
    /// An unset or blank variable falls through to the key file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if no source yields a key of the configured type.
    pub fn load_with_env<F>(config: &SigningKeyConfig, env: F) -> Result<Self, KeyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (material, source) = match env(&config.env_var).filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                (Zeroizing::new(unescape_newlines(value)), KeySource::Environment(config.env_var.clone()))
            },
            None => (read_key_file(&config.key_file, &config.env_var)?, KeySource::File(config.key_file.clone())),
        };

        let key = Self::from_material(config.algorithm, material.as_bytes(), source)?;

        tracing::info!(
            algorithm = %key.algorithm,
            source = %key.source,
            "Signing key loaded"
        );

        Ok(key)
    }

    /// Builds an Ed25519 key from PKCS#8 PEM.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::WrongType`] if the PEM label is not `PRIVATE KEY`,
    /// or [`KeyError::Invalid`] if the document does not hold an Ed25519 key.
    pub fn from_ed25519_pem(pem: &str) -> Result<Self, KeyError> {
        Self::from_material(KeyAlgorithm::EdDsa, pem.as_bytes(), KeySource::Inline)
    }

    /// Builds an HS256 key from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Invalid`] if the secret is shorter than
    /// [`MIN_HMAC_SECRET_LEN`] bytes.
    pub fn from_hmac_secret(secret: &[u8]) -> Result<Self, KeyError> {
        Self::from_material(KeyAlgorithm::Hs256, secret, KeySource::Inline)
    }

    fn from_material(
        algorithm: KeyAlgorithm,
        material: &[u8],
        source: KeySource,
    ) -> Result<Self, KeyError> {
        let label = std::str::from_utf8(material).ok().and_then(pem_label);

        let (encoding, decoding) = match algorithm {
            KeyAlgorithm::EdDsa => {
                match label {
                    Some(PKCS8_PRIVATE_KEY_LABEL) => {},
                    Some(other) => {
                        return Err(KeyError::WrongType {
                            expected: format!("PEM {PKCS8_PRIVATE_KEY_LABEL}"),
                            found: format!("PEM {other}"),
                        });
                    },
                    None => {
                        return Err(KeyError::WrongType {
                            expected: format!("PEM {PKCS8_PRIVATE_KEY_LABEL}"),
                            found: "non-PEM data".to_owned(),
                        });
                    },
                }
                let pem = std::str::from_utf8(material)
                    .map_err(|_| KeyError::Invalid("PEM is not valid UTF-8".to_owned()))?;
                ed25519_keys(pem)?
            },
            KeyAlgorithm::Hs256 => {
                if let Some(label) = label {
                    return Err(KeyError::WrongType {
                        expected: "raw HMAC secret".to_owned(),
                        found: format!("PEM {label}"),
                    });
                }
                if material.len() < MIN_HMAC_SECRET_LEN {
                    return Err(KeyError::Invalid(format!(
                        "HS256 secret must be at least {MIN_HMAC_SECRET_LEN} bytes, got {}",
                        material.len()
                    )));
                }
                (EncodingKey::from_secret(material), DecodingKey::from_secret(material))
            },
        };

        Ok(Self { algorithm, encoding, decoding, source })
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Where the key was loaded from.
    #[must_use]
    pub fn source(&self) -> &KeySource {
        &self.source
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .field("source", &self.source)
            .field("material", &"[redacted]")
            .finish()
    }
}

fn ed25519_keys(pem: &str) -> Result<(EncodingKey, DecodingKey), KeyError> {
    let signing_key = ed25519_dalek::SigningKey::from_pkcs8_pem(pem)
        .map_err(|e| KeyError::Invalid(format!("not an Ed25519 PKCS#8 key: {e}")))?;

    // jsonwebtoken wants the PKCS#8 DER for signing and the raw public key for verifying.
    let der = signing_key
        .to_pkcs8_der()
        .map_err(|e| KeyError::Invalid(format!("failed to encode Ed25519 key: {e}")))?;
    let encoding = EncodingKey::from_ed_der(der.as_bytes());

    let public_key = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());
    let decoding = DecodingKey::from_ed_components(&public_key)
        .map_err(|e| KeyError::Invalid(format!("failed to derive verifying key: {e}")))?;

    Ok((encoding, decoding))
}

fn read_key_file(path: &Path, env_var: &str) -> Result<Zeroizing<String>, KeyError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Zeroizing::new(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(KeyError::NotFound {
            env_var: env_var.to_owned(),
            path: path.to_path_buf(),
        }),
        Err(source) => Err(KeyError::Io { path: path.to_path_buf(), source }),
    }
}

/// Returns the label of the first PEM boundary, if `text` contains one.
fn pem_label(text: &str) -> Option<&str> {
    let start = text.find("-----BEGIN ")? + "-----BEGIN ".len();
    let rest = &text[start..];
    let end = rest.find("-----")?;
    Some(&rest[..end])
}

/// Environment variables often carry PEM with literal `\n` sequences.
fn unescape_newlines(value: String) -> String {
    if value.contains('\n') || !value.contains("\\n") {
        value
    } else {
        value.replace("\\n", "\n")
    }
}
