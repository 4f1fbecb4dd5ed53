// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ENV` | `development` or `production` | `development` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_ACCESS_SECRET` | HS256 key for access tokens | `dev_access_secret` (development only) |
//! | `JWT_REFRESH_SECRET` | Key for refresh/one-time token digests | `dev_refresh_secret` (development only) |
//! | `REDIS_URL` | KV store; `memory://` selects the in-process store | `redis://127.0.0.1:6379` |
//! | `DATA_DIR` | Directory of the redb database file | `./data` |
//! | `REPOS_ROOT` | Root of bare repositories | `./data/repos` |
//! | `PUBLIC_BASE_URL` | Base URL used in mailed links | `http://localhost:8080` |
//! | `MAIL_RELAY_URL` | HTTP mail relay endpoint | unset (mail is logged) |
//! | `MAIL_FROM` | Sender address | `no-reply@gitnest.local` |
//! | `RATE_LIMIT_PER_MINUTE` | Requests per client per minute | `10` |
//! | `TRUST_PROXY_HEADERS` | Key rate limits by `X-Forwarded-For`/`X-Real-IP` | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

/// Name of the redb file inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "gitnest.redb";

/// `REDIS_URL` value selecting the in-process KV store.
pub const MEMORY_KV_URL: &str = "memory://";

const DEV_ACCESS_SECRET: &str = "dev_access_secret";
const DEV_REFRESH_SECRET: &str = "dev_refresh_secret";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub access_secret: String,
    pub refresh_secret: String,
    pub redis_url: String,
    pub data_dir: PathBuf,
    pub repos_root: PathBuf,
    pub public_base_url: url::Url,
    pub mail_relay_url: Option<url::Url>,
    pub mail_from: String,
    pub rate_limit_per_minute: u64,
    pub trust_proxy_headers: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = match var("APP_ENV").as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    reason: format!("unknown environment {other:?}"),
                })
            }
        };

        let secret = |name: &'static str, dev_default: &str| match var(name) {
            Some(v) => Ok(v),
            None if environment == Environment::Development => Ok(dev_default.to_string()),
            None => Err(ConfigError::Missing(name)),
        };
        let access_secret = secret("JWT_ACCESS_SECRET", DEV_ACCESS_SECRET)?;
        let refresh_secret = secret("JWT_REFRESH_SECRET", DEV_REFRESH_SECRET)?;

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("PORT").unwrap_or_else(|| "8080".to_string());
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "HOST/PORT",
                reason: e.to_string(),
            })?;

        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "./data".to_string()));
        let repos_root = var("REPOS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("repos"));

        let public_base_url = parse_url(
            "PUBLIC_BASE_URL",
            &var("PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
        )?;
        let mail_relay_url = var("MAIL_RELAY_URL")
            .map(|v| parse_url("MAIL_RELAY_URL", &v))
            .transpose()?;

        let rate_limit_per_minute = match var("RATE_LIMIT_PER_MINUTE") {
            None => 10,
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "RATE_LIMIT_PER_MINUTE",
                    reason: format!("expected a positive integer, got {v:?}"),
                })?,
        };

        let trust_proxy_headers = match var("TRUST_PROXY_HEADERS").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "TRUST_PROXY_HEADERS",
                    reason: format!("expected true or false, got {other:?}"),
                })
            }
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            environment,
            bind_addr,
            access_secret,
            refresh_secret,
            redis_url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            data_dir,
            repos_root,
            public_base_url,
            mail_relay_url,
            mail_from: var("MAIL_FROM").unwrap_or_else(|| "no-reply@gitnest.local".to_string()),
            rate_limit_per_minute,
            trust_proxy_headers,
            log_format,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn uses_memory_kv(&self) -> bool {
        self.redis_url == MEMORY_KV_URL
    }

    /// Whether either token secret is still the development default.
    pub fn uses_dev_secrets(&self) -> bool {
        self.access_secret == DEV_ACCESS_SECRET || self.refresh_secret == DEV_REFRESH_SECRET
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<url::Url, ConfigError> {
    url::Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
