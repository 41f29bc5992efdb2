use crate::api::system::HEALTH_ROUTE;
use crate::auth::signer::{ExpiryPolicy, Secret, SecretTooShort};
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "TOKENGATE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tokengate.yml";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GET_TOKEN_ROUTE: &str = "/token";
pub const DEFAULT_CHECK_TOKEN_ROUTE: &str = "/check";

// Gateway configuration, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: Option<SocketAddr>,
    pub debug: bool,
    pub secret: Secret,
    pub remote: String,
    pub routes: RouteConfig,
    // Embedded as `data` in every outbound assertion.
    pub request_token_data: serde_yaml::Value,
    pub expiry_policy: ExpiryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub get_token: String,
    pub check_token: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            get_token: DEFAULT_GET_TOKEN_ROUTE.to_string(),
            check_token: DEFAULT_CHECK_TOKEN_ROUTE.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config yaml {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(transparent)]
    Secret(#[from] SecretTooShort),
}

// YAML keys keep the camelCase names used by existing gateway config files.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayConfigFile {
    port: Option<Scalar>,
    debug: Option<Scalar>,
    enc_key: Option<String>,
    remote: Option<String>,
    get_token_route: Option<String>,
    check_token_route: Option<String>,
    #[serde(default)]
    request_token_data: serde_yaml::Value,
    expiry_policy: Option<ExpiryPolicy>,
    metrics_bind: Option<String>,
}

// Older files quote ports and flags (`port: "8080"`, `debug: "true"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl GatewayConfig {
    /// Load the file named by `TOKENGATE_CONFIG` (or the default path) and
    /// apply `TOKENGATE_*` environment overrides.
    pub fn from_env_or_yaml() -> Result<Self, ConfigError> {
        let path = config_path(process_env);
        Self::load(&path, process_env)
    }

    pub fn load(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents, path, env)
    }

    pub fn from_yaml_str(
        contents: &str,
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut file: GatewayConfigFile =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        apply_env_overrides(&mut file, env);
        Self::from_file(file)
    }

    fn from_file(file: GatewayConfigFile) -> Result<Self, ConfigError> {
        let enc_key = file.enc_key.ok_or(ConfigError::Missing("encKey"))?;
        let secret = Secret::new(enc_key.into_bytes())?;

        let remote = file.remote.ok_or(ConfigError::Missing("remote"))?;
        validate_remote(&remote)?;

        let port = match file.port {
            Some(value) => parse_port(value)?,
            None => DEFAULT_PORT,
        };
        let debug = match file.debug {
            Some(value) => parse_flag("debug", value)?,
            None => false,
        };
        let metrics_bind = file
            .metrics_bind
            .map(|value| {
                value.parse().map_err(|err| ConfigError::Invalid {
                    key: "metricsBind",
                    reason: format!("{value}: {err}"),
                })
            })
            .transpose()?;

        let routes = RouteConfig {
            get_token: file
                .get_token_route
                .unwrap_or_else(|| DEFAULT_GET_TOKEN_ROUTE.to_string()),
            check_token: file
                .check_token_route
                .unwrap_or_else(|| DEFAULT_CHECK_TOKEN_ROUTE.to_string()),
        };
        validate_routes(&routes)?;

        Ok(Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            metrics_bind,
            debug,
            secret,
            remote,
            routes,
            request_token_data: file.request_token_data,
            expiry_policy: file.expiry_policy.unwrap_or_default(),
        })
    }
}

// An empty variable counts as unset.
fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

fn apply_env_overrides(file: &mut GatewayConfigFile, env: impl Fn(&str) -> Option<String>) {
    if let Some(value) = env("TOKENGATE_PORT") {
        file.port = Some(Scalar::Text(value));
    }
    if let Some(value) = env("TOKENGATE_DEBUG") {
        file.debug = Some(Scalar::Text(value));
    }
    if let Some(value) = env("TOKENGATE_ENC_KEY") {
        file.enc_key = Some(value);
    }
    if let Some(value) = env("TOKENGATE_REMOTE") {
        file.remote = Some(value);
    }
    if let Some(value) = env("TOKENGATE_METRICS_BIND") {
        file.metrics_bind = Some(value);
    }
}

fn parse_port(value: Scalar) -> Result<u16, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { key: "port", reason };
    match value {
        Scalar::Number(number) => {
            u16::try_from(number).map_err(|_| invalid(format!("{number} is out of range")))
        }
        Scalar::Text(text) => text
            .trim()
            .parse()
            .map_err(|err| invalid(format!("{text}: {err}"))),
        Scalar::Bool(flag) => Err(invalid(format!("expected a port number, got {flag}"))),
    }
}

fn parse_flag(key: &'static str, value: Scalar) -> Result<bool, ConfigError> {
    match value {
        Scalar::Bool(flag) => Ok(flag),
        Scalar::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "" | "0" | "false" | "no" => Ok(false),
            other => Err(ConfigError::Invalid {
                key,
                reason: format!("expected a boolean, got {other}"),
            }),
        },
        Scalar::Number(number) => Ok(number != 0),
    }
}

fn validate_remote(remote: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(remote).map_err(|err| ConfigError::Invalid {
        key: "remote",
        reason: format!("{remote}: {err}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            key: "remote",
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(())
}

// Capture, wildcard and query syntax cannot appear in a literal route.
fn is_route_syntax(c: char) -> bool {
    matches!(c, ':' | '*' | '{' | '}' | '?' | '#') || c.is_whitespace()
}

fn validate_routes(routes: &RouteConfig) -> Result<(), ConfigError> {
    for (key, route) in [
        ("getTokenRoute", &routes.get_token),
        ("checkTokenRoute", &routes.check_token),
    ] {
        if !route.starts_with('/') {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{route:?} must start with '/'"),
            });
        }
        if let Some(bad) = route.chars().find(|&c| is_route_syntax(c)) {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{route:?} contains {bad:?}; routes are literal paths"),
            });
        }
        if route == HEALTH_ROUTE {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{route} is reserved for health checks"),
            });
        }
    }
    if routes.get_token == routes.check_token {
        return Err(ConfigError::Invalid {
            key: "checkTokenRoute",
            reason: "must differ from getTokenRoute".to_string(),
        });
    }
    Ok(())
}
