//! Process settings from environment variables (a `.env` file is loaded first when present).

use crate::error::ConfigError;
use std::net::SocketAddr;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Login entry point for redirects of anonymous actors.
    pub login_url: String,
    /// PostgreSQL schema holding entity tables and the `_sys_*` auth tables.
    pub schema: String,
    /// Path of `entities.json`.
    pub config_path: String,
    /// Page size of site list views.
    pub page_size: u32,
    /// Max request body size in bytes.
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/kernel".into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            login_url: "/login/".into(),
            schema: "kernel".into(),
            config_path: "entities.json".into(),
            page_size: 100,
            body_limit: 2 * 1024 * 1024,
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Load(format!("{} has an invalid value: {}", name, v)))
        })
        .transpose()
}

impl Settings {
    /// Read `DATABASE_URL`, `KERNEL_BIND_ADDR`, `KERNEL_LOGIN_URL`, `KERNEL_SCHEMA`,
    /// `KERNEL_CONFIG_PATH`, `KERNEL_PAGE_SIZE` and `KERNEL_BODY_LIMIT`; unset variables keep defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Settings::default();
        let settings = Settings {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parse_var("KERNEL_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            login_url: var("KERNEL_LOGIN_URL").unwrap_or(defaults.login_url),
            schema: var("KERNEL_SCHEMA").unwrap_or(defaults.schema),
            config_path: var("KERNEL_CONFIG_PATH").unwrap_or(defaults.config_path),
            page_size: parse_var("KERNEL_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            body_limit: parse_var("KERNEL_BODY_LIMIT")?.unwrap_or(defaults.body_limit),
        };
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation("KERNEL_PAGE_SIZE must be positive".into()));
        }
        if !self.schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') || self.schema.is_empty() {
            return Err(ConfigError::Validation(format!("invalid schema name: {}", self.schema)));
        }
        Ok(())
    }
}
