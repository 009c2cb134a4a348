/// JWT Claims structure
///
/// The payload signed inside every token. Field names follow the registered
/// JWT claims (RFC 7519) so the signature library can check `exp` and `iss`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;

/// Which of the two token kinds a token is, or is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access_token",
            TokenType::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access_token" => Ok(TokenType::Access),
            "refresh_token" => Ok(TokenType::Refresh),
            other => Err(AuthError::UnsupportedTokenType(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// User email, denormalized for handlers
    pub email: String,
    pub token_type: TokenType,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Build claims issued now and expiring `lifetime_seconds` from now
    pub fn new(
        user_id: Uuid,
        email: String,
        token_type: TokenType,
        lifetime_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id,
            email,
            token_type,
            iss: issuer,
            iat: now,
            exp: now + lifetime_seconds,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Same boundary the validator applies: a token is still good during its `exp` second
    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}
