use crate::utils::error::{BootstrapError, Result};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// 容器內的工作目錄必須是絕對路徑，且不可跳出 rootfs
pub fn validate_workdir(field_name: &str, workdir: &str) -> Result<()> {
    validate_path(field_name, workdir)?;

    if !workdir.starts_with('/') {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: workdir.to_string(),
            reason: "Working directory must be an absolute path".to_string(),
        });
    }

    if Path::new(workdir)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: workdir.to_string(),
            reason: "Working directory cannot contain '..'".to_string(),
        });
    }

    Ok(())
}

/// 相對於工作目錄的路徑：不可是絕對路徑，也不可用 '..' 跳出
pub fn validate_relative_path(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;

    let invalid = |reason: &str| BootstrapError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: path.to_string(),
        reason: reason.to_string(),
    };
    let path = Path::new(path);
    if path.has_root() || path.is_absolute() {
        return Err(invalid("Path must be relative to the working directory"));
    }
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(invalid("Path cannot contain '..'"));
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_command(field_name: &str, argv: &[String]) -> Result<()> {
    match argv.first() {
        Some(program) => validate_non_empty_string(field_name, program),
        None => Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: "[]".to_string(),
            reason: "Command must name a program".to_string(),
        }),
    }
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_port(field_name: &str, port: u32) -> Result<u16> {
    validate_range(field_name, port, 1, u16::MAX as u32)?;
    Ok(port as u16)
}

pub fn validate_host(field_name: &str, host: &str) -> Result<IpAddr> {
    host.trim()
        .parse::<IpAddr>()
        .map_err(|e| BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: host.to_string(),
            reason: format!("Invalid IP address: {}", e),
        })
}

/// 環境變數名稱：字母或底線開頭，只允許英數與底線
pub fn validate_env_name(field_name: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if !valid {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Not a valid environment variable name".to_string(),
        });
    }
    Ok(())
}

pub fn validate_distinct(field_name: &str, values: &[&str]) -> Result<()> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(*value) {
            return Err(BootstrapError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: "Value is used more than once".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| BootstrapError::MissingConfigError {
            field: field_name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_workdir() {
        assert!(validate_workdir("build.workdir", "/app").is_ok());
        assert!(validate_workdir("build.workdir", "/srv/app").is_ok());
        assert!(validate_workdir("build.workdir", "app").is_err());
        assert!(validate_workdir("build.workdir", "/app/../etc").is_err());
        assert!(validate_workdir("build.workdir", "").is_err());
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("env.entry_point", "app.py").is_ok());
        assert!(validate_relative_path("env.entry_point", "src/main.py").is_ok());
        assert!(validate_relative_path("env.entry_point", "./app.py").is_ok());
        assert!(validate_relative_path("env.entry_point", "/etc/hostname").is_err());
        assert!(validate_relative_path("env.entry_point", "/app/app.py").is_err());
        assert!(validate_relative_path("env.entry_point", "../outside.py").is_err());
        assert!(validate_relative_path("env.entry_point", "src/../../x.py").is_err());
        assert!(validate_relative_path("env.entry_point", "").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert_eq!(validate_port("env.port", 5000).unwrap(), 5000);
        assert_eq!(validate_port("env.port", 65535).unwrap(), 65535);
        assert!(validate_port("env.port", 0).is_err());
        assert!(validate_port("env.port", 70000).is_err());
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("env.host", "0.0.0.0").unwrap().is_unspecified());
        assert!(validate_host("env.host", "127.0.0.1").unwrap().is_loopback());
        assert!(validate_host("env.host", "::").is_ok());
        assert!(validate_host("env.host", "localhost").is_err());
    }

    #[test]
    fn test_validate_env_name() {
        assert!(validate_env_name("env.port_var", "APP_PORT").is_ok());
        assert!(validate_env_name("env.port_var", "_private").is_ok());
        assert!(validate_env_name("env.port_var", "1PORT").is_err());
        assert!(validate_env_name("env.port_var", "APP-PORT").is_err());
        assert!(validate_env_name("env.port_var", "").is_err());
    }

    #[test]
    fn test_validate_command() {
        assert!(validate_command("launch.command", &["flask".to_string()]).is_ok());
        assert!(validate_command("launch.command", &[]).is_err());
        assert!(validate_command("launch.command", &[" ".to_string()]).is_err());
    }

    #[test]
    fn test_validate_distinct() {
        assert!(validate_distinct("env", &["A", "B", "C"]).is_ok());
        assert!(validate_distinct("env", &["A", "B", "A"]).is_err());
    }
}
