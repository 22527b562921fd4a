use crate::domain::model::BaseInfo;
use crate::utils::error::{BootstrapError, Result};
use tokio::process::Command;

/// Runs the base runtime's version command and checks the reported version.
///
/// `expected` matches when it equals a whitespace-separated token of the
/// check output or is a dotted prefix of one (`3.9` matches `3.9.18`, not
/// `3.91`). Without `expected`, any successful check is accepted.
pub async fn select_environment(
    runtime: &str,
    version_args: &[String],
    expected: Option<&str>,
) -> Result<BaseInfo> {
    let unavailable = |reason: String| BootstrapError::BaseEnvironmentError {
        runtime: runtime.to_string(),
        reason,
    };

    tracing::debug!("Probing base runtime: {} {}", runtime, version_args.join(" "));
    let output = Command::new(runtime)
        .args(version_args)
        .output()
        .await
        .map_err(|e| unavailable(format!("cannot execute: {}", e)))?;

    if !output.status.success() {
        return Err(unavailable(format!(
            "version check exited with {}",
            output.status
        )));
    }

    // 有些直譯器把版本印在 stderr
    let mut reported = String::from_utf8_lossy(&output.stdout).into_owned();
    reported.push(' ');
    reported.push_str(&String::from_utf8_lossy(&output.stderr));
    let reported = reported.trim().to_string();

    let version = match expected {
        Some(expected) => find_version(&reported, expected).ok_or_else(|| {
            unavailable(format!(
                "required version {} but the check reported '{}'",
                expected, reported
            ))
        })?,
        None => reported
            .split_whitespace()
            .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(reported.as_str())
            .to_string(),
    };

    tracing::info!("🐍 Base environment: {} {}", runtime, version);
    Ok(BaseInfo {
        runtime: runtime.to_string(),
        version,
    })
}

fn find_version(reported: &str, expected: &str) -> Option<String> {
    reported
        .split_whitespace()
        .map(|token| token.trim_start_matches('v'))
        .find(|token| *token == expected || token.starts_with(&format!("{}.", expected)))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(text: &str) -> Vec<String> {
        vec!["-c".to_string(), format!("echo '{}'", text)]
    }

    #[test]
    fn test_find_version_prefix_rules() {
        assert_eq!(find_version("Python 3.9.18", "3.9").as_deref(), Some("3.9.18"));
        assert_eq!(find_version("Python 3.9.18", "3.9.18").as_deref(), Some("3.9.18"));
        assert_eq!(find_version("node v20.11.0", "20").as_deref(), Some("20.11.0"));
        assert!(find_version("Python 3.91.0", "3.9").is_none());
        assert!(find_version("Python 3.10.2", "3.1").is_none());
    }

    #[tokio::test]
    async fn test_select_environment_matches_version() {
        let base = select_environment("sh", &echo("Python 3.11.4"), Some("3.11"))
            .await
            .unwrap();
        assert_eq!(base.runtime, "sh");
        assert_eq!(base.version, "3.11.4");
    }

    #[tokio::test]
    async fn test_select_environment_without_expected_version() {
        let base = select_environment("sh", &echo("Python 3.12.1"), None).await.unwrap();
        assert_eq!(base.version, "3.12.1");
    }

    #[tokio::test]
    async fn test_version_mismatch_is_fatal() {
        let err = select_environment("sh", &echo("Python 3.8.10"), Some("3.11"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::BaseEnvironmentError { .. }));
    }

    #[tokio::test]
    async fn test_missing_runtime_is_fatal() {
        let err = select_environment("appbox-no-such-runtime", &[], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("appbox-no-such-runtime"));
    }

    #[tokio::test]
    async fn test_failing_version_check_is_fatal() {
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        assert!(select_environment("sh", &args, None).await.is_err());
    }
}
