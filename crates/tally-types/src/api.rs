use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::PointStats;
use crate::models::{Dispute, GameState, HistoryEntry, Person};

// -- JWT Claims --

/// JWT claims shared across tally-api (REST middleware) and tally-gateway
/// (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub profile: Person,
    pub exp: usize,
}

/// How long an issued session stays valid.
pub const TOKEN_LIFETIME_DAYS: i64 = 30;

impl Claims {
    pub fn new(user_id: Uuid, email: &str, profile: Person) -> Self {
        Self {
            sub: user_id,
            email: email.to_string(),
            profile,
            exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp()
                as usize,
        }
    }

    pub fn issue(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn verify(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
    }
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub profile: Person,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user_id: Uuid,
    pub profile: Person,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub profile: Person,
    pub token: String,
}

// -- Ledger --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwardPointRequest {
    pub person: Person,
    pub amount: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AwardPointResponse {
    pub entry: HistoryEntry,
    pub state: GameState,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditReasonRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisputeEntryRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisputeEntryResponse {
    pub entry: HistoryEntry,
    pub dispute: Dispute,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveDisputeRequest {
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveDisputeResponse {
    pub dispute: Dispute,
    pub state: GameState,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesRequest {
    #[serde(default)]
    pub my_image: Option<String>,
    #[serde(default)]
    pub their_image: Option<String>,
}

/// Full read of all three collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: GameState,
    /// Newest first.
    pub history: Vec<HistoryEntry>,
    /// Newest first.
    pub disputes: Vec<Dispute>,
}

pub type StatsResponse = PointStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let id = Uuid::new_v4();
        let token = Claims::new(id, "c@example.com", Person::Carlota)
            .issue("secret")
            .unwrap();

        let claims = Claims::verify(&token, "secret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.profile, Person::Carlota);

        assert!(Claims::verify(&token, "other-secret").is_err());
    }

    #[test]
    fn test_award_request_reason_optional() {
        let req: AwardPointRequest =
            serde_json::from_str(r#"{"person":"Filipe","amount":1}"#).unwrap();
        assert_eq!(req.person, Person::Filipe);
        assert!(req.reason.is_empty());

        assert!(serde_json::from_str::<AwardPointRequest>(r#"{"person":"Bob","amount":1}"#).is_err());
    }
}
