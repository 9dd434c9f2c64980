//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 30 second step,
//! six digits), compatible with common authenticator apps.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use super::SecretError;

type HmacSha1 = Hmac<Sha1>;

pub const STEP_SECONDS: u64 = 30;
pub const DIGITS: usize = 6;
/// Accepted clock drift, in steps, on either side of the current one.
pub const SKEW_STEPS: u64 = 1;
const SEED_BYTES: usize = 20;

/// Fresh 160-bit seed, base32 without padding.
pub fn generate_seed() -> String {
    let mut bytes = [0u8; SEED_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

fn decode_seed(seed: &str) -> Result<Vec<u8>, SecretError> {
    let normalized: String = seed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return Err(SecretError::InvalidSeed);
    }
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|_| SecretError::InvalidSeed)
}

fn hotp(key: &[u8], counter: u64) -> Result<String, SecretError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(|_| SecretError::InvalidSeed)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(format!("{:0width$}", binary % 10u32.pow(DIGITS as u32), width = DIGITS))
}

/// The code valid for the step containing `unix_time`.
pub fn code_at(seed: &str, unix_time: u64) -> Result<String, SecretError> {
    hotp(&decode_seed(seed)?, unix_time / STEP_SECONDS)
}

/// Checks `code` against the current step and one step either side.
/// Malformed codes are simply rejected; a malformed seed is an error.
pub fn verify(seed: &str, code: &str, unix_time: u64) -> Result<bool, SecretError> {
    let key = decode_seed(seed)?;
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let current = unix_time / STEP_SECONDS;
    let mut matched = false;
    for counter in current.saturating_sub(SKEW_STEPS)..=current.saturating_add(SKEW_STEPS) {
        let expected = hotp(&key, counter)?;
        matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ASCII "12345678901234567890", the RFC 6238 SHA1 test key.
    const RFC_SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn matches_rfc6238_vectors() {
        assert_eq!(code_at(RFC_SEED, 59).unwrap(), "287082");
        assert_eq!(code_at(RFC_SEED, 1_111_111_109).unwrap(), "081804");
        assert_eq!(code_at(RFC_SEED, 1_234_567_890).unwrap(), "005924");
        assert_eq!(code_at(RFC_SEED, 2_000_000_000).unwrap(), "279037");
    }

    #[test]
    fn accepts_one_step_of_drift() {
        let now = 1_700_000_000;
        let previous = code_at(RFC_SEED, now - STEP_SECONDS).unwrap();
        let next = code_at(RFC_SEED, now + STEP_SECONDS).unwrap();
        assert!(verify(RFC_SEED, &previous, now).unwrap());
        assert!(verify(RFC_SEED, &next, now).unwrap());
    }

    #[test]
    fn rejects_codes_two_steps_old() {
        // RFC 4226 vectors for the same key: counter 2 is 359152, the window
        // around counter 4 is 969429, 338314, 254676.
        let now = 4 * STEP_SECONDS;
        let stale = code_at(RFC_SEED, now - 2 * STEP_SECONDS).unwrap();
        assert_eq!(stale, "359152");
        assert_eq!(code_at(RFC_SEED, now).unwrap(), "338314");

        assert!(!verify(RFC_SEED, &stale, now).unwrap());
        assert!(verify(RFC_SEED, "969429", now).unwrap());
        assert!(verify(RFC_SEED, "254676", now).unwrap());
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(!verify(RFC_SEED, "12345", 59).unwrap());
        assert!(!verify(RFC_SEED, "28708a", 59).unwrap());
        assert!(!verify(RFC_SEED, "", 59).unwrap());
    }

    #[test]
    fn seed_tolerates_padding_and_case() {
        let padded = "gezdgnbvgy3tqojqgezdgnbvgy3tqojq====";
        assert_eq!(code_at(padded, 59).unwrap(), "287082");
        assert_eq!(code_at("not base32!", 59), Err(SecretError::InvalidSeed));
    }

    #[test]
    fn generated_seeds_round_trip() {
        let seed = generate_seed();
        assert_eq!(seed.len(), 32);
        let code = code_at(&seed, 1_000).unwrap();
        assert!(verify(&seed, &code, 1_000).unwrap());
    }
}
