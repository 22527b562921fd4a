use crate::utils::error::{BootstrapError, Result};
use crate::utils::validation::{
    validate_distinct, validate_env_name, validate_host, validate_port, validate_relative_path,
    validate_required_field, Validate,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tokio::net::TcpListener;

pub const DEFAULT_ENTRY_POINT: &str = "app.py";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Names of the environment variables that carry the runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvNames {
    pub entry_point: String,
    pub host: String,
    pub port: String,
}

impl Default for EnvNames {
    fn default() -> Self {
        Self {
            entry_point: "APP_ENTRY".to_string(),
            host: "APP_HOST".to_string(),
            port: "APP_PORT".to_string(),
        }
    }
}

impl Validate for EnvNames {
    fn validate(&self) -> Result<()> {
        validate_env_name("env.entry_point_var", &self.entry_point)?;
        validate_env_name("env.host_var", &self.host)?;
        validate_env_name("env.port_var", &self.port)?;
        validate_distinct("env", &[&self.entry_point, &self.host, &self.port])
    }
}

/// The entry point / host / port record handed to the launched application.
///
/// Built once and read-only afterwards. Components that need the bind
/// address receive this value explicitly instead of reading the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    entry_point: PathBuf,
    host: IpAddr,
    port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            entry_point: PathBuf::from(DEFAULT_ENTRY_POINT),
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
        }
    }
}

impl RuntimeConfig {
    pub fn new(entry_point: impl Into<PathBuf>, host: IpAddr, port: u16) -> Result<Self> {
        let entry_point = entry_point.into();
        validate_relative_path("entry_point", &entry_point.to_string_lossy())?;
        validate_port("port", port as u32)?;
        Ok(Self {
            entry_point,
            host,
            port,
        })
    }

    /// 從任意來源（行程環境、映像中的環境表）讀取三個設定值
    pub fn from_vars<F>(names: &EnvNames, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let entry_point = lookup(&names.entry_point);
        let entry_point = validate_required_field(&names.entry_point, &entry_point)?;
        validate_relative_path(&names.entry_point, entry_point)?;

        let host = lookup(&names.host);
        let host = validate_host(&names.host, validate_required_field(&names.host, &host)?)?;

        let port = lookup(&names.port);
        let raw_port = validate_required_field(&names.port, &port)?;
        let port = raw_port.trim().parse::<u32>().map_err(|e| {
            BootstrapError::InvalidConfigValueError {
                field: names.port.clone(),
                value: raw_port.clone(),
                reason: format!("Port is not a number: {}", e),
            }
        })?;
        let port = validate_port(&names.port, port)?;

        Self::new(entry_point.as_str(), host, port)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&EnvNames::default())
    }

    pub fn from_env_with(names: &EnvNames) -> Result<Self> {
        Self::from_vars(names, |name| std::env::var(name).ok())
    }

    pub fn entry_point(&self) -> &PathBuf {
        &self.entry_point
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// 綁定所有介面或非 loopback 位址時，容器外部才連得進來
    pub fn is_publicly_reachable(&self) -> bool {
        !self.host.is_loopback()
    }

    pub fn to_env(&self, names: &EnvNames) -> Vec<(String, String)> {
        vec![
            (
                names.entry_point.clone(),
                self.entry_point.to_string_lossy().into_owned(),
            ),
            (names.host.clone(), self.host.to_string()),
            (names.port.clone(), self.port.to_string()),
        ]
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BootstrapError::BindFailed { addr, source })?;
        tracing::info!("🔌 Listening on {}", addr);
        Ok(listener)
    }
}
