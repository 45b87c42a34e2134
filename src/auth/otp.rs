use rand::Rng;
use time::{Duration, OffsetDateTime};

/// Uniform random 6-digit code, zero-padded. No collision checking; a rare
/// repeat across accounts is an accepted risk.
pub fn generate_otp() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

pub fn otp_expiry(now: OffsetDateTime, ttl_minutes: i64) -> OffsetDateTime {
    now + Duration::minutes(ttl_minutes)
}

/// A submitted code is accepted iff it equals the stored code and the clock
/// has not passed the stored expiry. Both fields absent means no pending OTP.
pub fn otp_matches(
    stored: Option<&str>,
    expiry: Option<OffsetDateTime>,
    submitted: &str,
    now: OffsetDateTime,
) -> bool {
    match (stored, expiry) {
        (Some(code), Some(exp)) => code == submitted && now <= exp,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn generated_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expiry_is_ttl_minutes_out() {
        let now = datetime!(2025-01-01 12:00 UTC);
        assert_eq!(otp_expiry(now, 20), datetime!(2025-01-01 12:20 UTC));
    }

    #[test]
    fn matches_only_before_expiry() {
        let exp = datetime!(2025-01-01 12:20 UTC);
        assert!(otp_matches(Some("123456"), Some(exp), "123456", exp));
        assert!(!otp_matches(
            Some("123456"),
            Some(exp),
            "123456",
            exp + Duration::seconds(1)
        ));
    }

    #[test]
    fn rejects_wrong_code_and_missing_state() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let exp = now + Duration::minutes(20);
        assert!(!otp_matches(Some("123456"), Some(exp), "654321", now));
        assert!(!otp_matches(None, None, "123456", now));
    }
}
