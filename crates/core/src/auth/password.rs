//! Salted scrypt password hashes.
//!
//! Stored form: `$s0$<params>$<salt>$<hash>` where `params` is hex of
//! `log2(N) << 16 | r << 8 | p`, `salt` is base64 of the salt bytes and
//! `hash` is base64 of the 32-byte scrypt output.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use super::AuthError;

const VERSION: &str = "s0";
const HASH_LEN: usize = 32;

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl HashParams {
    pub fn new(log_n: u8, r: u32, p: u32) -> Self {
        Self { log_n, r, p }
    }

    fn encode(&self) -> String {
        format!(
            "{:x}",
            (u32::from(self.log_n) << 16) | ((self.r & 0xff) << 8) | (self.p & 0xff)
        )
    }

    fn decode(hex: &str) -> Option<Self> {
        let packed = u32::from_str_radix(hex, 16).ok()?;
        let log_n = u8::try_from((packed >> 16) & 0xffff).ok()?;
        Some(Self::new(log_n, (packed >> 8) & 0xff, packed & 0xff))
    }
}

impl Default for HashParams {
    /// N = 16384, r = 16, p = 16.
    fn default() -> Self {
        Self::new(14, 16, 16)
    }
}

/// Hash `password` with a fresh salt and the default cost.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with(password, HashParams::default())
}

/// Hash `password` with a fresh salt and the given cost.
pub fn hash_password_with(password: &str, params: HashParams) -> Result<String, AuthError> {
    // The salt fed to scrypt is the base64 text of 16 random bytes
    let random = uuid::Uuid::new_v4().into_bytes();
    let salt = BASE64_STANDARD.encode(random);
    let hash = derive(password, salt.as_bytes(), params)?;

    Ok(format!(
        "${}${}${}${}",
        VERSION,
        params.encode(),
        BASE64_STANDARD.encode(salt.as_bytes()),
        BASE64_STANDARD.encode(hash)
    ))
}

/// Check `password` against a stored hash.
///
/// Fails when the stored value is not a hash this module understands.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parsed = ParsedHash::parse(stored)?;
    let hash = derive(password, &parsed.salt, parsed.params)?;
    Ok(constant_time_eq(&hash, &parsed.hash))
}

/// Whether `stored` is a well-formed password hash.
pub fn is_password_hash(stored: &str) -> bool {
    ParsedHash::parse(stored).is_ok()
}

struct ParsedHash {
    params: HashParams,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl ParsedHash {
    fn parse(stored: &str) -> Result<Self, AuthError> {
        let invalid = |what: &str| AuthError::ConfigurationError(format!("password hash: {}", what));

        let parts: Vec<&str> = stored.trim().split('$').collect();
        if parts.len() != 5 || !parts[0].is_empty() {
            return Err(invalid("expected $s0$<params>$<salt>$<hash>"));
        }
        if parts[1] != VERSION {
            return Err(invalid(&format!("unsupported version {:?}", parts[1])));
        }
        let params = HashParams::decode(parts[2]).ok_or_else(|| invalid("bad parameters"))?;
        let salt = BASE64_STANDARD
            .decode(parts[3])
            .map_err(|_| invalid("bad salt encoding"))?;
        let hash = BASE64_STANDARD
            .decode(parts[4])
            .map_err(|_| invalid("bad hash encoding"))?;
        if hash.len() != HASH_LEN {
            return Err(invalid("hash must be 32 bytes"));
        }

        Ok(Self { params, salt, hash })
    }
}

fn derive(password: &str, salt: &[u8], params: HashParams) -> Result<Vec<u8>, AuthError> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, HASH_LEN)
        .map_err(|e| AuthError::ConfigurationError(format!("scrypt parameters: {}", e)))?;
    let mut output = vec![0u8; HASH_LEN];
    scrypt::scrypt(password.as_bytes(), salt, &scrypt_params, &mut output)
        .map_err(|e| AuthError::ConfigurationError(format!("scrypt: {}", e)))?;
    Ok(output)
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
