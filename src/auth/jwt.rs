/// JWT Token Authority
///
/// Issues, validates and refreshes HS512-signed access/refresh tokens.
/// Access and refresh tokens are signed with different secrets, and the
/// secret used for verification is chosen by the caller's expected type,
/// never by anything read from the token itself.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::JwtSettings;
use crate::error::{AuthError, ConfigError};

const ALGORITHM: Algorithm = Algorithm::HS512;

/// Access and refresh token returned at login
///
/// The refresh flow returns the caller's refresh token unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Stateless token issuer/validator
///
/// Holds only immutable key material, so clones can be shared freely across
/// worker threads.
#[derive(Clone)]
pub struct TokenAuthority {
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    issuer: String,
    validation: Validation,
}

impl TokenAuthority {
    /// Build the authority from startup configuration
    ///
    /// # Errors
    /// Returns a configuration error if a secret is empty, both secrets are
    /// equal, or the lifetimes are unusable.
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "iss", "exp"]);

        Ok(Self {
            access_keys: SigningKeys::from_secret(config.access_secret.as_bytes()),
            refresh_keys: SigningKeys::from_secret(config.refresh_secret.as_bytes()),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
            validation,
        })
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_token_expiry(&self) -> i64 {
        self.refresh_token_expiry
    }

    fn keys(&self, token_type: TokenType) -> &SigningKeys {
        match token_type {
            TokenType::Access => &self.access_keys,
            TokenType::Refresh => &self.refresh_keys,
        }
    }

    fn lifetime(&self, token_type: TokenType) -> i64 {
        match token_type {
            TokenType::Access => self.access_token_expiry,
            TokenType::Refresh => self.refresh_token_expiry,
        }
    }

    fn sign_with(&self, claims: &Claims, key_type: TokenType) -> Result<String, AuthError> {
        encode(&Header::new(ALGORITHM), claims, &self.keys(key_type).encoding)
            .map_err(|_| AuthError::SigningFailed)
    }

    /// Sign arbitrary claims with the secret belonging to their `token_type`
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        self.sign_with(claims, claims.token_type)
    }

    fn issue(&self, user_id: Uuid, email: &str, token_type: TokenType) -> Result<String, AuthError> {
        let claims = Claims::new(
            user_id,
            email.to_string(),
            token_type,
            self.lifetime(token_type),
            self.issuer.clone(),
        );
        self.encode(&claims)
    }

    /// Issue a fresh access/refresh pair for a user
    ///
    /// # Errors
    /// Returns `SigningFailed` if either token cannot be encoded
    pub fn issue_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, email, TokenType::Access)?,
            refresh_token: self.issue(user_id, email, TokenType::Refresh)?,
        })
    }

    /// Verify a token and return its claims
    ///
    /// The signature is checked with the secret of `expected`, then expiry
    /// (no leeway), issuer, and finally that the embedded type agrees.
    ///
    /// # Errors
    /// - `MalformedToken` if the string is not a decodable token
    /// - `SignatureInvalid` on a bad signature or foreign algorithm
    /// - `Expired` once `exp` has passed
    /// - `InvalidClaims` on a wrong issuer or missing registered claim
    /// - `TokenTypeMismatch` if the verified type differs from `expected`
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.keys(expected).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::SignatureInvalid
                }
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidIssuer => AuthError::InvalidClaims("issuer".to_string()),
                ErrorKind::MissingRequiredClaim(claim) => AuthError::InvalidClaims(claim.clone()),
                _ => AuthError::MalformedToken,
            })?;

        if claims.token_type != expected {
            return Err(AuthError::TokenTypeMismatch);
        }

        Ok(claims)
    }

    /// Mint a new access token from already validated refresh claims
    ///
    /// Performs no validation of its own; the refresh token is left untouched.
    pub fn refresh_access(&self, claims: &Claims) -> Result<String, AuthError> {
        self.issue(claims.sub, &claims.email, TokenType::Access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-key-at-least-32-characters-long".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            issuer: "test".to_string(),
        }
    }

    fn authority() -> TokenAuthority {
        TokenAuthority::new(&get_test_config()).expect("Failed to build token authority")
    }

    #[test]
    fn test_issue_and_validate_access_token() {
        let authority = authority();
        let user_id = Uuid::new_v4();

        let pair = authority.issue_pair(user_id, "test@example.com").unwrap();
        let claims = authority.validate(&pair.access_token, TokenType::Access).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_validates_as_refresh() {
        let authority = authority();
        let pair = authority.issue_pair(Uuid::new_v4(), "test@example.com").unwrap();

        let claims = authority.validate(&pair.refresh_token, TokenType::Refresh).unwrap();

        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_cross_type_rejected() {
        let authority = authority();
        let pair = authority.issue_pair(Uuid::new_v4(), "test@example.com").unwrap();

        assert_eq!(
            authority.validate(&pair.access_token, TokenType::Refresh),
            Err(AuthError::SignatureInvalid)
        );
        assert_eq!(
            authority.validate(&pair.refresh_token, TokenType::Access),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_type_field_checked_after_signature() {
        let authority = authority();
        let claims = Claims::new(
            Uuid::new_v4(),
            "test@example.com".to_string(),
            TokenType::Refresh,
            900,
            "test".to_string(),
        );
        // Refresh-typed payload under the access secret
        let token = authority.sign_with(&claims, TokenType::Access).unwrap();

        assert_eq!(
            authority.validate(&token, TokenType::Access),
            Err(AuthError::TokenTypeMismatch)
        );
    }

    #[test]
    fn test_expired_token() {
        let authority = authority();
        let claims = Claims::new(
            Uuid::new_v4(),
            "test@example.com".to_string(),
            TokenType::Access,
            -120,
            "test".to_string(),
        );
        let token = authority.encode(&claims).unwrap();

        assert_eq!(authority.validate(&token, TokenType::Access), Err(AuthError::Expired));
    }

    #[test]
    fn test_invalid_token() {
        let authority = authority();

        assert_eq!(
            authority.validate("invalid.token.here", TokenType::Access),
            Err(AuthError::MalformedToken)
        );
        assert_eq!(
            authority.validate("", TokenType::Access),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_tampered_token() {
        let authority = authority();
        let pair = authority.issue_pair(Uuid::new_v4(), "test@example.com").unwrap();

        let tampered = format!("{}X", pair.access_token);

        assert!(authority.validate(&tampered, TokenType::Access).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let authority = authority();
        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let other = TokenAuthority::new(&config).unwrap();

        let pair = other.issue_pair(Uuid::new_v4(), "test@example.com").unwrap();

        assert_eq!(
            authority.validate(&pair.access_token, TokenType::Access),
            Err(AuthError::InvalidClaims("issuer".to_string()))
        );
    }

    #[test]
    fn test_foreign_algorithm_rejected() {
        let authority = authority();
        let config = get_test_config();
        let claims = Claims::new(
            Uuid::new_v4(),
            "test@example.com".to_string(),
            TokenType::Access,
            900,
            "test".to_string(),
        );
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            authority.validate(&token, TokenType::Access),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_refresh_access_keeps_subject() {
        let authority = authority();
        let user_id = Uuid::new_v4();
        let pair = authority.issue_pair(user_id, "test@example.com").unwrap();
        let refresh_claims = authority.validate(&pair.refresh_token, TokenType::Refresh).unwrap();

        let access = authority.refresh_access(&refresh_claims).unwrap();
        let claims = authority.validate(&access, TokenType::Access).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_equal_secrets_refused() {
        let mut config = get_test_config();
        config.refresh_secret = config.access_secret.clone();

        assert!(TokenAuthority::new(&config).is_err());
    }
}
