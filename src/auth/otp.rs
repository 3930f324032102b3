//! One-time passwords for email and phone verification.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

pub const OTP_TTL_MINUTES: i64 = 10;
pub const RESEND_COOLDOWN_SECONDS: i64 = 60;
pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OtpChannel { Email, Phone }

pub fn generate_code() -> String { format!("{:06}", rand::thread_rng().gen_range(0..1_000_000)) }

fn code_mac(user_id: Uuid, code: &str) -> anyhow::Result<Hmac<Sha256>> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(user_id.as_bytes()).map_err(|_| anyhow::anyhow!("invalid OTP key"))?;
    mac.update(code.trim().as_bytes());
    Ok(mac)
}

/// Stored form of a code: HMAC-SHA256 of the code keyed by the owner's id.
pub fn hash_code(user_id: Uuid, code: &str) -> anyhow::Result<String> {
    Ok(hex::encode(code_mac(user_id, code)?.finalize().into_bytes()))
}

/// Constant-time comparison against a stored hash.
pub fn code_matches(user_id: Uuid, code: &str, stored_hash: &str) -> bool {
    let (Ok(tag), Ok(mac)) = (hex::decode(stored_hash), code_mac(user_id, code)) else { return false };
    mac.verify_slice(&tag).is_ok()
}

pub fn expires_at(now: DateTime<Utc>) -> DateTime<Utc> { now + Duration::minutes(OTP_TTL_MINUTES) }

/// Seconds the caller must still wait before another code may be sent.
pub fn cooldown_remaining(last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    let elapsed = (now - last_sent?).num_seconds();
    (elapsed < RESEND_COOLDOWN_SECONDS).then(|| RESEND_COOLDOWN_SECONDS - elapsed)
}

/// Masks all but the last few characters for logs and responses.
pub fn mask_target(target: &str) -> String {
    match target.split_once('@') {
        Some((local, domain)) => {
            let head: String = local.chars().take(2).collect();
            format!("{head}***@{domain}")
        }
        None => {
            let tail: String = target.chars().rev().take(3).collect::<Vec<_>>().into_iter().rev().collect();
            format!("*******{tail}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_is_bound_to_user() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(hash_code(a, "123456").unwrap(), hash_code(a, " 123456 ").unwrap());
        assert_ne!(hash_code(a, "123456").unwrap(), hash_code(b, "123456").unwrap());
    }

    #[test]
    fn test_code_matches() {
        let user = Uuid::new_v4();
        let stored = hash_code(user, "482913").unwrap();
        assert!(code_matches(user, "482913", &stored));
        assert!(!code_matches(user, "482914", &stored));
        assert!(!code_matches(Uuid::new_v4(), "482913", &stored));
        assert!(!code_matches(user, "482913", "not-hex"));
    }

    #[test]
    fn test_cooldown() {
        let now = Utc::now();
        assert_eq!(cooldown_remaining(None, now), None);
        assert_eq!(cooldown_remaining(Some(now - Duration::seconds(20)), now), Some(40));
        assert_eq!(cooldown_remaining(Some(now - Duration::seconds(61)), now), None);
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask_target("asha@example.com"), "as***@example.com");
        assert_eq!(mask_target("9845012345"), "*******345");
    }
}
