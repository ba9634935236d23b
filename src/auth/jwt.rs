use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    core::{ErrorContext, GatewayError, GatewayResult},
    model::{Account, User},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: u64,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Standard JWT Claims
    pub exp: u64,
    pub iat: u64,
    pub nbf: u64,
    /// Custom claims
    pub user: UserInfo,
    pub current_account: AccountInfo,
}

/// HS256 signing and verification with one shared secret.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation, // Pre-created for every request
}

impl JwtCodec {
    pub fn new(secret: &str, base64_secret: bool) -> GatewayResult<Self> {
        let key: Vec<u8> = if base64_secret {
            general_purpose::STANDARD
                .decode(secret)
                .map_err(|e| GatewayError::Configuration(format!("invalid base64 secret: {e}")))?
        } else {
            secret.as_bytes().to_vec()
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            validation,
        })
    }

    pub fn decode(&self, token: &str) -> GatewayResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("rejecting jwt: {e}");
                GatewayError::Unauthorized(super::INVALID_TOKEN.to_string())
            })
    }

    pub fn encode_user_info(&self, user: &User, account: &Account, ttl: Duration) -> GatewayResult<String> {
        encode_user_info(user, account, &self.encoding_key, ttl)
    }
}

/// Issues a token for `user` acting as `account`, valid from now for `ttl`.
pub fn encode_user_info(
    user: &User,
    account: &Account,
    key: &EncodingKey,
    ttl: Duration,
) -> GatewayResult<String> {
    let iat = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .with_context("reading clock")?
        .as_secs();
    let claims = Claims {
        exp: iat + ttl.as_secs(),
        iat,
        nbf: iat,
        user: UserInfo {
            email: user.email.clone(),
            name: user.name.clone(),
        },
        current_account: AccountInfo {
            id: account.id,
            name: account.name.clone(),
            namespace: account.namespace.clone(),
        },
    };
    encode(&Header::new(Algorithm::HS256), &claims, key).with_context("signing jwt")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("user@host.com.br", "John Doe")
    }

    #[test]
    fn test_round_trip_claims() {
        let codec = JwtCodec::new("secret", false).unwrap();
        let account = Account::new(5, "Infra Team", "infra", "company");
        let token = codec
            .encode_user_info(&user(), &account, Duration::from_secs(60))
            .unwrap();

        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.user.email, "user@host.com.br");
        assert_eq!(claims.current_account.id, 5);
        assert_eq!(claims.current_account.namespace, "infra");
        assert_eq!(claims.exp, claims.iat + 60);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let signer = JwtCodec::new("wrong key", false).unwrap();
        let verifier = JwtCodec::new("secret", false).unwrap();
        let account = Account::new(4, "Dev Team", "dev", "company");
        let token = signer
            .encode_user_info(&user(), &account, Duration::from_secs(60))
            .unwrap();

        let err = verifier.decode(&token).unwrap_err();
        assert_eq!(err.message(), "Authorization token is invalid");
        assert!(verifier.decode("not-a-jwt").is_err());
    }

    #[test]
    fn test_base64_secret() {
        let encoded = general_purpose::STANDARD.encode("secret");
        let codec = JwtCodec::new(&encoded, true).unwrap();
        let plain = JwtCodec::new("secret", false).unwrap();
        let account = Account::new(4, "Dev Team", "dev", "company");
        let token = plain
            .encode_user_info(&user(), &account, Duration::from_secs(60))
            .unwrap();
        assert!(codec.decode(&token).is_ok());
        assert!(JwtCodec::new("!!not base64!!", true).is_err());
    }
}
