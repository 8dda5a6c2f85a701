use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// JWTs use the URL-safe alphabet; some backends emit the standard one.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// The subset of session token claims the client looks at.
///
/// The token is never verified here. The backend signs and checks it; the
/// client only reads `exp` to avoid sending a token it knows is stale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Expiration, seconds since the Unix epoch.
    pub exp: f64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.exp * 1000.0) as i64)
    }

    /// Expired iff `exp` lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp_millis() as f64 / 1000.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("token must have exactly three dot-separated segments, found {0}")]
    Segments(usize),

    #[error("token payload is not valid base64")]
    Base64,

    #[error("token payload is not a JSON object with a numeric `exp`: {0}")]
    Payload(String),
}

/// Decode the claims carried in the middle segment of a session token.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenDecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenDecodeError::Segments(segments.len()));
    }

    let payload = segments[1];
    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))
        .map_err(|_| TokenDecodeError::Base64)?;

    serde_json::from_slice(&bytes).map_err(|e| TokenDecodeError::Payload(e.to_string()))
}

/// Whether `token` should be treated as expired at `now`.
///
/// Anything that fails to decode counts as expired.
pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.is_expired_at(now),
        Err(err) => {
            tracing::debug!(error = %err, "session token could not be decoded; treating as expired");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use chrono::Duration;
    use proptest::prelude::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    fn token_expiring_at(exp: i64) -> String {
        token_with_payload(&format!(r#"{{"sub":"u-1","exp":{exp}}}"#))
    }

    #[test]
    fn future_exp_is_not_expired() {
        let now = Utc::now();
        let token = token_expiring_at((now + Duration::minutes(5)).timestamp());
        assert!(!is_token_expired(&token, now));
    }

    #[test]
    fn past_exp_is_expired() {
        let now = Utc::now();
        let token = token_expiring_at((now - Duration::seconds(1)).timestamp());
        assert!(is_token_expired(&token, now));
    }

    #[test]
    fn standard_padded_payload_is_accepted() {
        let now = Utc::now();
        let exp = (now + Duration::hours(1)).timestamp();
        let token = format!("h.{}.s", STANDARD.encode(format!(r#"{{"exp":{exp}}}"#)));
        assert!(!is_token_expired(&token, now));
    }

    #[test]
    fn wrong_segment_count_is_expired() {
        let now = Utc::now();
        assert!(is_token_expired("", now));
        assert!(is_token_expired("only-one", now));
        assert!(is_token_expired("two.segments", now));
        assert!(is_token_expired("a.b.c.d", now));
        assert_eq!(decode_claims("two.segments"), Err(TokenDecodeError::Segments(2)));
    }

    #[test]
    fn non_json_payload_is_expired() {
        let token = token_with_payload("definitely not json");
        assert!(is_token_expired(&token, Utc::now()));
    }

    #[test]
    fn payload_without_exp_is_expired() {
        let token = token_with_payload(r#"{"sub":"u-1"}"#);
        assert!(matches!(decode_claims(&token), Err(TokenDecodeError::Payload(_))));
        assert!(is_token_expired(&token, Utc::now()));
    }

    #[test]
    fn expires_at_round_trips_seconds() {
        let claims = TokenClaims { exp: 1_700_000_000.0 };
        assert_eq!(claims.expires_at().map(|t| t.timestamp()), Some(1_700_000_000));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Strings that cannot have three segments are always expired.
        #[test]
        fn undotted_strings_are_expired(s in "[^.]*") {
            prop_assert!(is_token_expired(&s, Utc::now()));
        }

        /// Expiry follows the sign of `exp - now`.
        #[test]
        fn expiry_tracks_exp_claim(offset in -1_000_000i64..1_000_000i64) {
            prop_assume!(offset != 0);
            let now = Utc::now();
            let token = token_expiring_at(now.timestamp() + offset);
            prop_assert_eq!(is_token_expired(&token, now), offset < 0);
        }
    }
}
