use crate::error::ConfigError;

const MIN_REFRESH_TO_ACCESS_RATIO: i64 = 10;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings
///
/// The two secrets are independent: one signs access tokens, the other
/// refresh tokens. Neither may be empty and they must differ.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,   // seconds (900 = 15 minutes)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,  // seconds (604800 = 7 days)
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_secret".to_string()));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_secret".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.refresh_token_expiry < self.access_token_expiry * MIN_REFRESH_TO_ACCESS_RATIO {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.refresh_token_expiry must be at least {}x jwt.access_token_expiry",
                MIN_REFRESH_TO_ACCESS_RATIO
            )));
        }
        Ok(())
    }
}

/// Password hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    /// bcrypt work factor, shared by every hash this deployment produces
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_access_token_expiry() -> i64 {
    900
}

fn default_refresh_token_expiry() -> i64 {
    604_800
}

fn default_issuer() -> String {
    "share-docs".to_string()
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Load settings from an optional `configuration.{yaml,toml,json}` file,
/// overridden by `APP_`-prefixed environment variables
/// (`APP_JWT__ACCESS_SECRET`, `APP_APPLICATION__PORT`, ...).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-at-least-32-characters-long".to_string(),
            refresh_secret: "refresh-secret-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(jwt_settings().validate().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut settings = jwt_settings();
        settings.refresh_secret = String::new();

        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_equal_secrets_rejected() {
        let mut settings = jwt_settings();
        settings.refresh_secret = settings.access_secret.clone();

        assert!(matches!(settings.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_refresh_lifetime_must_be_much_longer() {
        let mut settings = jwt_settings();
        settings.refresh_token_expiry = settings.access_token_expiry * 2;

        assert!(matches!(settings.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_non_positive_lifetime_rejected() {
        let mut settings = jwt_settings();
        settings.access_token_expiry = 0;

        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_password_defaults_to_bcrypt_default_cost() {
        assert_eq!(PasswordSettings::default().bcrypt_cost, bcrypt::DEFAULT_COST);
    }
}
