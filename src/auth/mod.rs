/// Authentication module
///
/// Password credential hashing/verification and typed access/refresh
/// token issuance, validation and refresh.

mod claims;
mod jwt;
mod password;

pub use claims::{Claims, TokenType};
pub use jwt::{TokenAuthority, TokenPair};
pub use password::{CredentialVerifier, HashedCredential, MAX_PASSWORD_BYTES};
