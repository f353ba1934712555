//! Short-lived bearer tokens for facilitator calls.
//!
//! Every request carries a fresh JWT whose `uri` claim names the HTTP method,
//! host and path of that exact request. The header carries a random `nonce`,
//! which `jsonwebtoken`'s [`Header`](jsonwebtoken::Header) has no field for, so
//! the token is assembled here and only the signature is delegated to
//! [`jsonwebtoken::crypto::sign`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey};
use rand::Rng;
use serde::Serialize;
use solana_keypair::Keypair;
use std::fmt;
use url::Url;
use x402_settle_types::timestamp::UnixTimestamp;
use x402_settle_types::util::Base64Bytes;

pub const JWT_ISSUER: &str = "cdp";
pub const JWT_AUDIENCE: &str = "cdp_service";
/// Lifetime of a token, from `nbf` to `exp`.
pub const JWT_TTL_SECS: u64 = 120;

/// DER prefix of a PKCS#8 v1 Ed25519 private key; the 32-byte seed follows.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Invalid EC private key: {0}")]
    InvalidEcKey(#[source] jsonwebtoken::errors::Error),
    #[error("Ed25519 secret is not valid base64: {0}")]
    InvalidBase64(#[source] base64::DecodeError),
    #[error("Ed25519 secret must be 32 or 64 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Ed25519 secret's public half does not match the key derived from its seed")]
    Ed25519PublicKeyMismatch,
    #[error("URL {0} has no host")]
    MissingHost(Url),
    #[error("Failed to encode JWT segment: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to sign JWT: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: Algorithm,
    kid: &'a str,
    typ: &'static str,
    nonce: String,
}

#[derive(Debug, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    pub uri: String,
}

/// Signs per-request tokens with an API key.
#[derive(Clone)]
pub struct JwtSigner {
    key_id: String,
    key: EncodingKey,
    algorithm: Algorithm,
}

impl fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSigner")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JwtSigner {
    /// ES256 signer from a PKCS#8 PEM EC key.
    pub fn es256(key_id: impl Into<String>, pem: &[u8]) -> Result<Self, JwtError> {
        let key = EncodingKey::from_ec_pem(pem).map_err(JwtError::InvalidEcKey)?;
        Ok(Self {
            key_id: key_id.into(),
            key,
            algorithm: Algorithm::ES256,
        })
    }

    /// EdDSA signer from a raw Ed25519 key: the 32-byte seed, or the 64-byte
    /// seed-and-public-key form. Any other length is rejected, as is a 64-byte
    /// key whose public half was not derived from its seed.
    pub fn ed25519(key_id: impl Into<String>, raw: &[u8]) -> Result<Self, JwtError> {
        let seed = match raw.len() {
            32 => raw,
            64 => {
                Keypair::try_from(raw).map_err(|_| JwtError::Ed25519PublicKeyMismatch)?;
                &raw[..32]
            }
            other => return Err(JwtError::InvalidKeyLength(other)),
        };
        let mut der = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + seed.len());
        der.extend_from_slice(&ED25519_PKCS8_PREFIX);
        der.extend_from_slice(seed);
        Ok(Self {
            key_id: key_id.into(),
            key: EncodingKey::from_ed_der(&der),
            algorithm: Algorithm::EdDSA,
        })
    }

    /// Picks the algorithm from the secret's shape: PEM means ES256, anything
    /// else is read as a base64 Ed25519 key.
    pub fn from_secret(key_id: impl Into<String>, secret: &str) -> Result<Self, JwtError> {
        let secret = secret.trim();
        if secret.starts_with("-----BEGIN") {
            // Secrets from env files often carry escaped newlines.
            let pem = secret.replace("\\n", "\n");
            Self::es256(key_id, pem.as_bytes())
        } else {
            let raw = Base64Bytes::from(secret)
                .decode()
                .map_err(JwtError::InvalidBase64)?;
            Self::ed25519(key_id, &raw)
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Token for one `method` request to `url`, valid for two minutes from now.
    pub fn sign(&self, method: &str, url: &Url) -> Result<String, JwtError> {
        self.sign_at(method, url, UnixTimestamp::now())
    }

    pub fn sign_at(&self, method: &str, url: &Url, now: UnixTimestamp) -> Result<String, JwtError> {
        let claims = JwtClaims {
            iss: JWT_ISSUER.to_string(),
            sub: self.key_id.clone(),
            aud: vec![JWT_AUDIENCE.to_string()],
            iat: now.as_secs(),
            nbf: now.as_secs(),
            exp: now.as_secs() + JWT_TTL_SECS,
            uri: request_uri(method, url)?,
        };
        let nonce: [u8; 16] = rand::rng().random();
        let header = JwtHeader {
            alg: self.algorithm,
            kid: &self.key_id,
            typ: "JWT",
            nonce: hex::encode(nonce),
        };
        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?),
        );
        let signature = jsonwebtoken::crypto::sign(message.as_bytes(), &self.key, self.algorithm)
            .map_err(JwtError::Sign)?;
        Ok(format!("{message}.{signature}"))
    }
}

/// `"METHOD host/path"`, e.g. `"POST api.cdp.coinbase.com/platform/v2/x402/verify"`.
/// A non-default port stays attached to the host.
pub fn request_uri(method: &str, url: &Url) -> Result<String, JwtError> {
    let host = url
        .host_str()
        .ok_or_else(|| JwtError::MissingHost(url.clone()))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(format!("{} {}{}", method.to_uppercase(), host, url.path()))
}
