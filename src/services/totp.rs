//! Time-based one-time passwords (RFC 6238) and related secrets
//!
//! Codes are HMAC-SHA256 based. Secrets are exchanged as unpadded RFC 4648
//! base32 strings, the format authenticator apps expect in `otpauth://` URIs.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::config::TwoFactorConfig;
use crate::utils::validation::normalize_code;

type HmacSha256 = Hmac<Sha256>;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Length of generated TOTP secrets in bytes
pub const SECRET_LEN: usize = 20;

/// Length of trusted device tokens in bytes
pub const DEVICE_TOKEN_LEN: usize = 32;

/// Encode bytes as unpadded base32
pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

/// Decode base32, ignoring case, padding and whitespace
pub fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for c in encoded.chars() {
        if c == '=' || c.is_whitespace() {
            continue;
        }
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a as char == c.to_ascii_uppercase())? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }

    Some(out)
}

/// Hex SHA-256 digest used to store codes and tokens
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// New random TOTP secret, base32 encoded
pub fn generate_secret() -> String {
    base32_encode(&random_bytes(SECRET_LEN))
}

/// Backup codes: 8 upper-case hex characters each
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| hex::encode_upper(random_bytes(4)))
        .collect()
}

/// Storage form of a backup code as typed by a user
pub fn hash_backup_code(code: &str) -> String {
    sha256_hex(&normalize_code(code).to_uppercase())
}

/// Random URL-safe device token
pub fn generate_device_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(DEVICE_TOKEN_LEN))
}

/// HOTP value (RFC 4226 truncation) for one counter
pub fn hotp(secret: &[u8], counter: u64, digits: u32) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret).context("Invalid HMAC key")?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(hash[offset] & 0x7f) << 24)
        | (u32::from(hash[offset + 1]) << 16)
        | (u32::from(hash[offset + 2]) << 8)
        | u32::from(hash[offset + 3]);
    let code = binary % 10u32.pow(digits);

    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// TOTP generator and verifier
#[derive(Debug, Clone)]
pub struct Totp {
    digits: u32,
    period: u64,
    skew: u64,
    issuer: String,
}

impl Totp {
    pub fn new(config: &TwoFactorConfig) -> Self {
        Self {
            digits: config.digits,
            period: config.period_secs,
            skew: config.skew_steps,
            issuer: config.issuer.clone(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Code for a given unix time
    pub fn generate_at(&self, secret: &str, unix_time: u64) -> Result<String> {
        let key = base32_decode(secret).context("TOTP secret is not valid base32")?;
        hotp(&key, unix_time / self.period, self.digits)
    }

    /// Check a code against the window around `unix_time`
    pub fn verify_at(&self, secret: &str, code: &str, unix_time: u64) -> Result<bool> {
        let code = normalize_code(code);
        if code.len() != self.digits as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let key = base32_decode(secret).context("TOTP secret is not valid base32")?;
        let step = unix_time / self.period;
        let first = step.saturating_sub(self.skew);
        for counter in first..=step + self.skew {
            if hotp(&key, counter, self.digits)? == code {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn verify(&self, secret: &str, code: &str) -> Result<bool> {
        self.verify_at(secret, code, chrono::Utc::now().timestamp().max(0) as u64)
    }

    /// `otpauth://` URI for authenticator apps
    pub fn provisioning_uri(&self, secret: &str, account_name: &str) -> String {
        let label = format!("{}:{}", self.issuer, account_name);
        format!(
            "otpauth://totp/{}?secret={}&issuer={}&algorithm=SHA256&digits={}&period={}",
            urlencoding::encode(&label),
            secret,
            urlencoding::encode(&self.issuer),
            self.digits,
            self.period
        )
    }
}
