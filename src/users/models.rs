use crate::db::schema::users;
use crate::types::{ApiError, ValidationError};
use chrono::{DateTime, Utc};
use crypto::pbkdf2::*;
use crypto::sha2::Sha256;
use diesel::prelude::*;
use jwt::{Header, Registered, Token};
use std::io::Result as IoResult;

const PBKDF2_ROUNDS: u32 = 1000;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, PartialEq)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn make_password(password: &str) -> IoResult<String> {
        pbkdf2_simple(password, PBKDF2_ROUNDS)
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        let check = pbkdf2_check(password_to_verify, &self.password);
        check.map_err(|_| ApiError::Internal)
    }

    /// Signed session token for this user, valid for `ttl_hours`.
    pub fn session_token(&self, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
        let header = Header::default();
        let expires = ttl_hours
            .checked_mul(3600)
            .and_then(|ttl| Utc::now().timestamp().checked_add(ttl))
            .ok_or(ApiError::Internal)?;
        let claims = Registered {
            iss: Some(self.username.clone()),
            sub: Some(self.id.to_string()),
            exp: Some(expires.max(0) as u64),
            ..Default::default()
        };
        let token = Token::new(header, claims);
        token
            .signed(secret.as_bytes(), Sha256::new())
            .map_err(|_| ApiError::Internal)
    }

    /// Checks signature and expiry of a session token and returns the id of
    /// the user it was issued to.
    pub fn verify_session(jwt_token: &str, secret: &str) -> Result<i32, ValidationError> {
        let invalid = || ValidationError::from("session", "Invalid session token");
        let token = Token::<Header, Registered>::parse(jwt_token).map_err(|_| invalid())?;
        if !token.verify(secret.as_bytes(), Sha256::new()) {
            return Err(invalid());
        }

        let now = Utc::now().timestamp().max(0) as u64;
        match token.claims.exp {
            Some(exp) if exp > now => {}
            _ => return Err(ValidationError::from("session", "Session expired")),
        }

        match &token.claims.sub {
            Some(user_id) => user_id.parse::<i32>().map_err(|_| invalid()),
            None => Err(invalid()),
        }
    }

    pub fn load_from_session(
        jwt_token: &str,
        secret: &str,
        connection: &PgConnection,
    ) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;
        let user_id = User::verify_session(jwt_token, secret)?;
        users
            .find(user_id)
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name: &str, connection: &PgConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;
        users
            .filter(username.eq(name))
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Insertable)]
#[table_name = "users"]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: &str, password: &str) -> IoResult<NewUser> {
        Ok(NewUser {
            username: username.to_string(),
            password: User::make_password(password)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            password: User::make_password("pw1").unwrap(),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn password_hash_checks_out() {
        let user = alice();
        assert_ne!(user.password, "pw1");
        assert!(user.verify_password("pw1").unwrap());
        assert!(!user.verify_password("pw2").unwrap());
    }

    #[test]
    fn session_token_round_trip() {
        let token = alice().session_token("secret", 1).unwrap();
        assert_eq!(User::verify_session(&token, "secret"), Ok(7));
    }

    #[test]
    fn session_token_with_other_secret_is_rejected() {
        let token = alice().session_token("secret", 1).unwrap();
        let error = User::verify_session(&token, "other").unwrap_err();
        assert_eq!(error.messages("session").len(), 1);
    }

    #[test]
    fn expired_session_token_is_rejected() {
        let token = alice().session_token("secret", -1).unwrap();
        let error = User::verify_session(&token, "secret").unwrap_err();
        assert_eq!(error.messages("session"), &["Session expired".to_string()][..]);
    }

    #[test]
    fn overflowing_session_lifetime_is_an_error() {
        match alice().session_token("secret", i64::MAX) {
            Err(ApiError::Internal) => {}
            other => panic!("expected internal error, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_not_a_session() {
        assert!(User::verify_session("not.a.token", "secret").is_err());
        assert!(User::verify_session("", "secret").is_err());
    }
}
