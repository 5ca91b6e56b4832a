use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use config::{Config as ConfigLoader, Environment, Source};
use is_terminal::IsTerminal;
use serde::Deserialize;

const PREFIX: &str = "FINAUTH";
// One year.
const MAX_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Default)]
pub enum LogStyle {
    #[default]
    Auto,
    Always,
    Never,
}

impl LogStyle {
    pub fn is_color(&self) -> bool {
        match self {
            LogStyle::Auto => std::io::stdout().is_terminal(),
            LogStyle::Always => true,
            LogStyle::Never => false,
        }
    }
}

impl<'de> Deserialize<'de> for LogStyle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?.to_lowercase();
        match s.as_str() {
            "auto" => Ok(LogStyle::Auto),
            "always" => Ok(LogStyle::Always),
            "never" => Ok(LogStyle::Never),
            _ => Err(serde::de::Error::unknown_variant(
                &s,
                &["auto", "always", "never"],
            )),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Log {
    pub level: String,
    pub style: LogStyle,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: String::from("finauth=info"),
            style: LogStyle::default(),
        }
    }
}

/// Token signing algorithm. Only the HMAC-SHA256 family member is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SigningAlgorithm {
    #[default]
    Hs256,
}

impl SigningAlgorithm {
    pub fn as_jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            SigningAlgorithm::Hs256 => jsonwebtoken::Algorithm::HS256,
        }
    }
}

impl<'de> Deserialize<'de> for SigningAlgorithm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            _ => Err(serde::de::Error::unknown_variant(&s, &["HS256"])),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Auth {
    pub signing_secret: String,
    pub signing_algorithm: SigningAlgorithm,
    pub default_ttl_minutes: i64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            signing_algorithm: SigningAlgorithm::default(),
            default_ttl_minutes: 30,
            hash_memory_kib: argon2::Params::DEFAULT_M_COST,
            hash_iterations: argon2::Params::DEFAULT_T_COST,
            hash_parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl Auth {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "authentication signing secret must be set".into(),
            ));
        }
        if self.default_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "authentication token ttl must be greater than zero".into(),
            ));
        }
        if self.default_ttl_minutes > MAX_TTL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "authentication token ttl must not exceed {MAX_TTL_MINUTES} minutes"
            )));
        }
        if let Err(err) = self.hash_params() {
            return Err(ConfigError::Invalid(format!(
                "invalid password hashing cost: {err}"
            )));
        }
        Ok(())
    }

    pub fn hash_params(&self) -> Result<argon2::Params, argon2::Error> {
        argon2::Params::new(
            self.hash_memory_kib,
            self.hash_iterations,
            self.hash_parallelism,
            None,
        )
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("signing_secret_set", &!self.signing_secret.is_empty())
            .field("signing_algorithm", &self.signing_algorithm)
            .field("default_ttl_minutes", &self.default_ttl_minutes)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .field("hash_parallelism", &self.hash_parallelism)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Belvo {
    pub secret_id: String,
    pub secret_password: String,
    pub api_url: String,
    pub link_id: String,
    pub max_attempts: usize,
}

impl Default for Belvo {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_password: String::new(),
            api_url: String::from("https://sandbox.belvo.com/api"),
            link_id: String::from("8848bd0c-9c7e-4f53-a732-ec896b11d4c4"),
            max_attempts: 3,
        }
    }
}

impl fmt::Debug for Belvo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Belvo")
            .field("secret_id_set", &!self.secret_id.is_empty())
            .field("secret_password_set", &!self.secret_password.is_empty())
            .field("api_url", &self.api_url)
            .field("link_id", &self.link_id)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub log: Log,
    pub addr: SocketAddr,
    pub database_url: String,
    pub debug: bool,
    pub cors_origins: String,
    pub auth: Auth,
    pub belvo: Belvo,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log: Log::default(),
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8000),
            database_url: String::from("data/finauth.db"),
            debug: false,
            cors_origins: String::new(),
            auth: Auth::default(),
            belvo: Belvo::default(),
        }
    }
}

impl Config {
    /// Comma separated `cors_origins`, blanks dropped.
    pub fn cors_origins(&self) -> Vec<&str> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(PREFIX)
        .separator("__")
        .prefix_separator("_")
        .try_parsing(true)
}

pub fn load_from<S>(source: S) -> Result<Config, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    let config = ConfigLoader::builder()
        .add_source(source)
        .build()?
        .try_deserialize::<Config>()?;
    config.auth.validate()?;
    Ok(config)
}

pub fn load() -> Result<Config, ConfigError> {
    load_from(environment())
}
