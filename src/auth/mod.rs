//! Identity layer.
//!
//! Establishes the calling user and the account the request acts as,
//! before any splitting happens. Two schemes share the `Authorization`
//! header: `Token <auth key>` and `JWT <token>`.

pub mod jwt;
pub mod store;

use crate::{
    config,
    core::{GatewayError, GatewayResult},
    model::User,
    utils::request::get_query_value,
};

pub use jwt::JwtCodec;
pub use store::UserStore;

pub const ACCOUNT_QUERY: &str = "account_id";

pub(crate) const INVALID_TOKEN: &str = "Authorization token is invalid";
const NO_ACCOUNT: &str = "No associated account";
const UNKNOWN_ACCOUNT: &str = "Account does not exist";
const PERMISSION_DENIED: &str = "Permission Denied to access this account";

pub struct Authenticator {
    store: UserStore,
    jwt: JwtCodec,
}

impl Authenticator {
    pub fn new(store: UserStore, jwt: JwtCodec) -> Self {
        Self { store, jwt }
    }

    pub fn from_config(cfg: &config::Auth) -> GatewayResult<Self> {
        let jwt = JwtCodec::new(&cfg.jwt_secret, cfg.base64_secret)?;
        Ok(Self::new(UserStore::from_config(cfg), jwt))
    }

    pub fn jwt(&self) -> &JwtCodec {
        &self.jwt
    }

    /// Resolves the caller from the `Authorization` header value and the
    /// request query string, with `current_account` set.
    pub fn authenticate(&self, authorization: Option<&str>, query: Option<&str>) -> GatewayResult<User> {
        let (scheme, credential) = authorization
            .map(str::trim)
            .and_then(|value| value.split_once(' '))
            .map(|(scheme, credential)| (scheme, credential.trim()))
            .ok_or_else(|| unauthorized(INVALID_TOKEN))?;

        match scheme {
            "JWT" => self.authenticate_jwt(credential),
            "Token" => self.authenticate_token(credential, query),
            _ => Err(unauthorized(INVALID_TOKEN)),
        }
    }

    fn authenticate_token(&self, key: &str, query: Option<&str>) -> GatewayResult<User> {
        let user = self
            .store
            .user_by_key(key)
            .ok_or_else(|| unauthorized(INVALID_TOKEN))?;

        match get_query_value(query, ACCOUNT_QUERY) {
            Some(raw) => {
                let id = raw
                    .parse::<u64>()
                    .map_err(|_| unauthorized(UNKNOWN_ACCOUNT))?;
                self.act_as(user, id)
            }
            None => {
                let default = user
                    .accounts
                    .first()
                    .cloned()
                    .ok_or_else(|| unauthorized(NO_ACCOUNT))?;
                Ok(user.with_account(default))
            }
        }
    }

    fn authenticate_jwt(&self, token: &str) -> GatewayResult<User> {
        let claims = self.jwt.decode(token)?;
        let user = self
            .store
            .user_by_email(&claims.user.email)
            .ok_or_else(|| unauthorized(INVALID_TOKEN))?;
        self.act_as(user, claims.current_account.id)
    }

    fn act_as(&self, user: User, account_id: u64) -> GatewayResult<User> {
        let account = self
            .store
            .account(account_id)
            .ok_or_else(|| unauthorized(UNKNOWN_ACCOUNT))?;
        if !user.is_member_of(account_id) {
            log::info!("{} denied access to account {account_id}", user.email);
            return Err(unauthorized(PERMISSION_DENIED));
        }
        Ok(user.with_account(account))
    }
}

fn unauthorized(msg: &str) -> GatewayError {
    GatewayError::Unauthorized(msg.to_string())
}
