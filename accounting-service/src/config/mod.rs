use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Deadline applied to every credential store and directory call.
    pub request_timeout_ms: u64,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub token: TokenConfig,
    pub admin: AdminConfig,
    pub identity: IdentityConfig,
    pub ids: IdOffsets,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub lifetime_seconds: i64,
    pub algorithm: String,
}

/// How a user (as opposed to the sentinel admin) proves super-admin status.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SuperAdminProof {
    /// Only the sentinel credential and directory administrator groups count.
    Sentinel,
    /// An `admin=true` membership in the `admins` group counts as well.
    AdminsGroup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub access: String,
    pub secret: String,
    pub proof: SuperAdminProof,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    Directory,
    Local,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub url: String,
    /// Appended as `user@domain` when binding directly as the user.
    pub domain: String,
    pub search_base: String,
    /// Attribute matched against the login name during the search.
    pub login_attr: String,
    /// Service account used to locate the user entry before binding as it.
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub administrator_groups: Vec<String>,
    pub required_groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub backend: IdentityBackend,
    pub directory: Option<DirectoryConfig>,
    pub local_credentials_file: Option<String>,
    /// Group names that make a provider-verified user a super-admin.
    pub administrator_groups: Vec<String>,
    /// Create a user record on first successful provider login.
    pub auto_provision: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IdOffsets {
    pub gid_init: i64,
    pub uid_init: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub enable_swagger: bool,
}

macro_rules! impl_from_str {
    ($ty:ty, $label:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!("Invalid {}: {}", $label, other)),
                }
            }
        }
    };
}

impl_from_str!(Environment, "environment", { "dev" => Environment::Dev, "prod" => Environment::Prod });
impl_from_str!(StoreBackend, "store backend", {
    "postgres" => StoreBackend::Postgres,
    "memory" => StoreBackend::Memory,
});
impl_from_str!(SessionBackend, "session backend", {
    "memory" => SessionBackend::Memory,
    "redis" => SessionBackend::Redis,
});
impl_from_str!(SuperAdminProof, "admin proof", {
    "sentinel" => SuperAdminProof::Sentinel,
    "admins_group" => SuperAdminProof::AdminsGroup,
});
impl_from_str!(IdentityBackend, "identity backend", {
    "directory" => IdentityBackend::Directory,
    "local" => IdentityBackend::Local,
    "disabled" => IdentityBackend::Disabled,
});

impl AccountingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = parse_env("ENVIRONMENT", "dev", false)?;
        let is_prod = environment == Environment::Prod;

        let database = DatabaseConfig {
            backend: parse_env("STORE_BACKEND", "postgres", false)?,
            url: optional_env("DATABASE_URL"),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", false)?,
        };

        let session = SessionConfig {
            backend: parse_env("SESSION_BACKEND", "memory", false)?,
            redis_url: optional_env("REDIS_URL"),
        };

        let identity_backend: IdentityBackend = parse_env("IDENTITY_BACKEND", "disabled", false)?;
        let directory = if identity_backend == IdentityBackend::Directory {
            Some(DirectoryConfig {
                url: get_env("LDAP_URL", None, is_prod)?,
                domain: get_env("LDAP_DOMAIN", None, is_prod)?,
                search_base: get_env("LDAP_SEARCH_BASE", None, is_prod)?,
                login_attr: get_env("LDAP_LOGIN_ATTR", Some("sAMAccountName"), false)?,
                bind_dn: optional_env("LDAP_BIND_DN"),
                bind_password: optional_env("LDAP_BIND_PASSWORD"),
                administrator_groups: list_env("LDAP_ADMINISTRATOR_GROUPS"),
                required_groups: list_env("LDAP_REQUIRED_GROUPS"),
            })
        } else {
            None
        };
        let administrator_groups = directory
            .as_ref()
            .map(|d| d.administrator_groups.clone())
            .unwrap_or_else(|| list_env("ADMINISTRATOR_GROUPS"));

        let config = AccountingConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("accounting-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            request_timeout_ms: parse_env("REQUEST_TIMEOUT_MS", "5000", false)?,
            database,
            session,
            token: TokenConfig {
                secret: get_env("TOKEN_SECRET", None, is_prod)?,
                issuer: get_env("TOKEN_ISSUER", Some("accounting-center"), is_prod)?,
                lifetime_seconds: parse_env("TOKEN_LIFETIME_SECONDS", "3600", false)?,
                algorithm: get_env("TOKEN_ALGORITHM", Some("HS256"), false)?,
            },
            admin: AdminConfig {
                access: get_env("ADMIN_ACCESS", None, is_prod)?,
                secret: get_env("ADMIN_SECRET", None, is_prod)?,
                proof: parse_env("ADMIN_PROOF", "admins_group", false)?,
            },
            identity: IdentityConfig {
                backend: identity_backend,
                directory,
                local_credentials_file: optional_env("LOCAL_CREDENTIALS_FILE"),
                administrator_groups,
                auto_provision: parse_env("IDENTITY_AUTO_PROVISION", "true", false)?,
            },
            ids: IdOffsets {
                gid_init: parse_env("GID_INIT", "0", false)?,
                uid_init: parse_env("UID_INIT", "0", false)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "60", false)?,
                enable_swagger: parse_env("ENABLE_SWAGGER", if is_prod { "false" } else { "true" }, false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.token.lifetime_seconds <= 0 {
            return Err(config_error("TOKEN_LIFETIME_SECONDS must be positive"));
        }

        if !matches!(self.token.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(config_error("TOKEN_ALGORITHM must be one of HS256, HS384, HS512"));
        }

        if self.token.secret.len() < 32 {
            return Err(config_error("TOKEN_SECRET must be at least 32 bytes"));
        }

        if self.admin.access.trim().is_empty() || self.admin.secret.is_empty() {
            return Err(config_error("ADMIN_ACCESS and ADMIN_SECRET must be set"));
        }

        if self.request_timeout_ms == 0 {
            return Err(config_error("REQUEST_TIMEOUT_MS must be positive"));
        }

        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(config_error("DATABASE_URL is required for the postgres store"));
        }

        if self.session.backend == SessionBackend::Redis && self.session.redis_url.is_none() {
            return Err(config_error("REDIS_URL is required for the redis session store"));
        }

        if self.identity.backend == IdentityBackend::Local
            && self.identity.local_credentials_file.is_none()
        {
            return Err(config_error(
                "LOCAL_CREDENTIALS_FILE is required for the local identity backend",
            ));
        }

        if let Some(directory) = &self.identity.directory {
            if directory.bind_dn.is_some() != directory.bind_password.is_some() {
                return Err(config_error(
                    "LDAP_BIND_DN and LDAP_BIND_PASSWORD must be set together",
                ));
            }
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error("Wildcard CORS origin not allowed in production"));
            }

            if self.database.backend == StoreBackend::Memory {
                tracing::error!("In-memory credential store configured in production; data will not survive a restart");
            }
        }

        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn list_env(key: &str) -> Vec<String> {
    optional_env(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
