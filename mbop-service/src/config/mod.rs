use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MbopConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub users_module: String,
    pub directory: DirectoryConfig,
    pub token: TokenConfig,
    pub catchall: CatchallConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub ams: AmsConfig,
    pub keycloak: KeycloakConfig,
}

/// Managed-accounts (AMS) backend settings.
#[derive(Debug, Clone, Default)]
pub struct AmsConfig {
    pub url: String,
    pub oauth_token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub is_internal_label: String,
}

/// Directory-service (keycloak + user service) backend settings.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub token_url: String,
    pub token_path: String,
    pub token_username: String,
    pub token_password: String,
    pub token_grant_type: String,
    pub token_client_id: String,
    pub timeout_seconds: u64,
    pub user_service_scheme: String,
    pub user_service_host: String,
    pub user_service_port: String,
    pub user_service_timeout_seconds: u64,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            token_url: "http://localhost:8080/".to_string(),
            token_path: "realms/master/protocol/openid-connect/token".to_string(),
            token_username: "admin".to_string(),
            token_password: "admin".to_string(),
            token_grant_type: "password".to_string(),
            token_client_id: "admin-cli".to_string(),
            timeout_seconds: 60,
            user_service_scheme: "http".to_string(),
            user_service_host: "localhost".to_string(),
            user_service_port: ":8000".to_string(),
            user_service_timeout_seconds: 60,
        }
    }
}

impl KeycloakConfig {
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.token_url.trim_end_matches('/'),
            self.token_path.trim_start_matches('/')
        )
    }

    /// Base URL of the user service. The port setting carries its own leading colon.
    pub fn user_service_base(&self) -> String {
        format!(
            "{}://{}{}",
            self.user_service_scheme, self.user_service_host, self.user_service_port
        )
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub ttl: Duration,
    pub kid: String,
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub struct CatchallConfig {
    pub disabled: bool,
    pub upstream_url: Option<String>,
}

impl MbopConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let config = MbopConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("mbop-service"))?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            store: StoreConfig {
                backend: get_env("STORE_BACKEND", Some("memory"))?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                database: DatabaseConfig {
                    host: get_env("DATABASE_HOST", Some("localhost"))?,
                    port: parse_env("DATABASE_PORT", "5432")?,
                    user: get_env("DATABASE_USER", Some("postgres"))?,
                    password: get_env("DATABASE_PASSWORD", Some(""))?,
                    name: get_env("DATABASE_NAME", Some("mbop"))?,
                    max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
                    min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1")?,
                },
            },
            users_module: get_env("USERS_MODULE", Some(""))?,
            directory: DirectoryConfig {
                ams: AmsConfig {
                    url: get_env("AMS_URL", Some(""))?,
                    oauth_token_url: get_env("OAUTH_TOKEN_URL", Some(""))?,
                    client_id: get_env("COGNITO_APP_CLIENT_ID", Some(""))?,
                    client_secret: get_env("COGNITO_APP_CLIENT_SECRET", Some(""))?,
                    scope: get_env("COGNITO_SCOPE", Some(""))?,
                    is_internal_label: get_env("IS_INTERNAL_LABEL", Some(""))?,
                },
                keycloak: KeycloakConfig {
                    token_url: get_env("KEYCLOAK_TOKEN_URL", Some("http://localhost:8080/"))?,
                    token_path: get_env(
                        "KEYCLOAK_TOKEN_PATH",
                        Some("realms/master/protocol/openid-connect/token"),
                    )?,
                    token_username: get_env("KEYCLOAK_TOKEN_USERNAME", Some("admin"))?,
                    token_password: get_env("KEYCLOAK_TOKEN_PASSWORD", Some("admin"))?,
                    token_grant_type: get_env("KEYCLOAK_TOKEN_GRANT_TYPE", Some("password"))?,
                    token_client_id: get_env("KEYCLOAK_TOKEN_CLIENT_ID", Some("admin-cli"))?,
                    timeout_seconds: parse_env("KEYCLOAK_TIMEOUT", "60")?,
                    user_service_scheme: get_env("KEYCLOAK_USER_SERVICE_SCHEME", Some("http"))?,
                    user_service_host: get_env("KEYCLOAK_USER_SERVICE_HOST", Some("localhost"))?,
                    user_service_port: get_env("KEYCLOAK_USER_SERVICE_PORT", Some(":8000"))?,
                    user_service_timeout_seconds: parse_env(
                        "KEYCLOAK_USER_SERVICE_TIMEOUT",
                        "60",
                    )?,
                },
            },
            token: TokenConfig {
                ttl: parse_duration(&get_env("TOKEN_TTL_DURATION", Some("5m"))?)
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
                kid: get_env("TOKEN_KID", Some(""))?,
                private_key: get_env("TOKEN_PRIVATE_KEY", Some(""))?,
                public_key: get_env("TOKEN_PUBLIC_KEY", Some(""))?,
            },
            catchall: CatchallConfig {
                disabled: parse_env("DISABLE_CATCHALL", "false")?,
                upstream_url: get_optional_env("LEGACY_MBOP_URL"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.token.ttl.is_zero() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_TTL_DURATION must be positive"
            )));
        }

        if self.store.backend == StoreBackend::Postgres && self.store.database.name.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_NAME is required when STORE_BACKEND=postgres"
            )));
        }

        if self.users_module == "ams"
            && (self.directory.ams.url.is_empty() || self.directory.ams.oauth_token_url.is_empty())
        {
            tracing::warn!("USERS_MODULE=ams but AMS_URL or OAUTH_TOKEN_URL is unset; directory requests will be rejected");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(format!(
                "{} is required but not set",
                key
            )))),
        },
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env(key, Some(default))?)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e))
    })
}

/// Parses durations of the form `30s`, `5m`, `1h` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration: {}", value))?;

    let multiplier: u64 = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => return Err(format!("Invalid duration unit in: {}", value)),
    };

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration out of range: {}", value))
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}
