use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::config::Auth as AuthConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of checking a bearer token.
///
/// Failure carries no reason: expired, forged and malformed tokens all look
/// the same to the caller.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid { subject: String },
    Invalid,
}

impl Verification {
    pub fn subject(self) -> Option<String> {
        match self {
            Verification::Valid { subject } => Some(subject),
            Verification::Invalid => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token subject must not be empty")]
    EmptySubject,
    #[error("token ttl must be greater than zero")]
    NonPositiveTtl,
    #[error("token ttl is out of range")]
    TtlOverflow,
    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.signing_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: config.signing_algorithm.as_jwt(),
            default_ttl: Duration::try_minutes(config.default_ttl_minutes)
                .unwrap_or(Duration::zero()),
        }
    }

    pub fn issue(&self, subject: &str, ttl: Option<Duration>) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::EmptySubject);
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(TokenError::NonPositiveTtl);
        }

        // `exp` has whole-second precision; round up so the token never dies
        // before the reported `expires_at`, which is the instant `exp` encodes.
        let deadline = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::TtlOverflow)?;
        let exp = match deadline.timestamp_subsec_nanos() {
            0 => deadline.timestamp(),
            _ => deadline
                .timestamp()
                .checked_add(1)
                .ok_or(TokenError::TtlOverflow)?,
        };
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(TokenError::TtlOverflow)?;
        let claims = Claims {
            sub: subject.to_string(),
            exp,
            iat: now.timestamp(),
        };
        let header = Header::new(self.algorithm);
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Verification {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Verification {
        // Expiry is checked below against `now` so the clock stays injectable.
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(err) => {
                match err.kind() {
                    ErrorKind::InvalidAlgorithm => debug!("token rejected: algorithm mismatch"),
                    ErrorKind::InvalidSignature => debug!("token rejected: bad signature"),
                    kind => debug!("token rejected: {:?}", kind),
                }
                return Verification::Invalid;
            }
        };

        if now.timestamp() >= claims.exp {
            debug!("token rejected: expired");
            return Verification::Invalid;
        }
        if claims.sub.is_empty() {
            debug!("token rejected: empty subject");
            return Verification::Invalid;
        }

        Verification::Valid {
            subject: claims.sub,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_service(secret: &str) -> TokenService {
    TokenService::new(&AuthConfig {
        signing_secret: secret.into(),
        default_ttl_minutes: 30,
        ..AuthConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn valid(subject: &str) -> Verification {
        Verification::Valid {
            subject: subject.into(),
        }
    }

    #[test]
    fn issue_then_verify_returns_subject() {
        let service = test_service("secret");
        let issued = service.issue("alice", Some(Duration::minutes(5))).unwrap();
        assert_eq!(service.verify(&issued.token), valid("alice"));
    }

    #[test]
    fn token_is_compact_jws() {
        let issued = test_service("secret").issue("alice", None).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["sub"], "alice");
        assert!(payload["exp"].as_i64().unwrap() > payload["iat"].as_i64().unwrap());
    }

    #[test]
    fn default_ttl_applies_when_none_given() {
        let service = test_service("secret");
        let issued = service.issue_at("alice", None, t0()).unwrap();
        assert_eq!(issued.expires_at, t0() + Duration::minutes(30));
    }

    #[test]
    fn valid_until_expiry_then_invalid() {
        let service = test_service("secret");
        let issued = service
            .issue_at("alice", Some(Duration::minutes(15)), t0())
            .unwrap();

        let at = |minutes| t0() + Duration::minutes(minutes);
        assert_eq!(service.verify_at(&issued.token, at(10)), valid("alice"));
        assert_eq!(service.verify_at(&issued.token, at(20)), Verification::Invalid);
    }

    #[test]
    fn expiry_instant_itself_is_invalid() {
        let service = test_service("secret");
        let issued = service
            .issue_at("alice", Some(Duration::seconds(60)), t0())
            .unwrap();
        let just_before = t0() + Duration::seconds(59);
        assert_eq!(service.verify_at(&issued.token, just_before), valid("alice"));
        assert_eq!(
            service.verify_at(&issued.token, issued.expires_at),
            Verification::Invalid
        );
    }

    #[test]
    fn sub_second_ttl_is_valid_right_after_issue() {
        let service = test_service("secret");
        let now = t0() + Duration::milliseconds(100);
        let issued = service
            .issue_at("alice", Some(Duration::milliseconds(500)), now)
            .unwrap();
        assert_eq!(service.verify_at(&issued.token, now), valid("alice"));
        assert_eq!(issued.expires_at, t0() + Duration::seconds(1));
    }

    #[test]
    fn reported_expiry_matches_the_exp_claim() {
        let service = test_service("secret");
        let now = t0() + Duration::milliseconds(900);
        let issued = service
            .issue_at("alice", Some(Duration::minutes(15)), now)
            .unwrap();

        let payload = issued.token.split('.').nth(1).unwrap();
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(payload["exp"].as_i64().unwrap(), issued.expires_at.timestamp());
        assert_eq!(issued.expires_at.timestamp_subsec_nanos(), 0);
        assert!(issued.expires_at >= now + Duration::minutes(15));

        let just_before = issued.expires_at - Duration::milliseconds(500);
        assert_eq!(service.verify_at(&issued.token, just_before), valid("alice"));
        assert_eq!(
            service.verify_at(&issued.token, issued.expires_at),
            Verification::Invalid
        );
    }

    #[test]
    fn expired_token_is_invalid_with_wall_clock() {
        let service = test_service("secret");
        let issued = service
            .issue_at("alice", Some(Duration::minutes(1)), Utc::now() - Duration::minutes(5))
            .unwrap();
        assert_eq!(service.verify(&issued.token), Verification::Invalid);
    }

    #[test]
    fn other_secret_is_invalid() {
        let issued = test_service("secret-a").issue("alice", None).unwrap();
        assert_eq!(
            test_service("secret-b").verify(&issued.token),
            Verification::Invalid
        );
    }

    #[test]
    fn altered_payload_is_invalid() {
        let service = test_service("secret");
        let issued = service.issue("alice", None).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["sub"] = json!("mallory");
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(service.verify(&forged), Verification::Invalid);
    }

    #[test]
    fn other_algorithm_is_invalid() {
        let service = test_service("secret");
        let claims = Claims {
            sub: "alice".into(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            iat: Utc::now().timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(service.verify(&token), Verification::Invalid);
    }

    #[test]
    fn unsigned_token_is_invalid() {
        let service = test_service("secret");
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{exp},"iat":0}}"#));
        assert_eq!(
            service.verify(&format!("{header}.{payload}.")),
            Verification::Invalid
        );
    }

    #[test]
    fn missing_subject_is_invalid() {
        #[derive(Serialize)]
        struct NoSubject {
            exp: i64,
        }
        let service = test_service("secret");
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &NoSubject {
                exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            },
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(service.verify(&token), Verification::Invalid);
    }

    #[test]
    fn garbage_is_invalid() {
        let service = test_service("secret");
        for token in ["", "not-a-token", "a.b.c", "a.b", "...."] {
            assert_eq!(service.verify(token), Verification::Invalid);
        }
    }

    #[test]
    fn empty_subject_or_ttl_is_rejected_at_issue() {
        let service = test_service("secret");
        assert!(matches!(
            service.issue("", None),
            Err(TokenError::EmptySubject)
        ));
        assert!(matches!(
            service.issue("alice", Some(Duration::zero())),
            Err(TokenError::NonPositiveTtl)
        ));
        assert!(matches!(
            service.issue("alice", Some(Duration::minutes(-1))),
            Err(TokenError::NonPositiveTtl)
        ));
        assert!(matches!(
            service.issue("alice", Some(Duration::MAX)),
            Err(TokenError::TtlOverflow)
        ));
    }
}
