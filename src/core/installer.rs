use crate::domain::ports::{InstallRequest, Installer};
use crate::utils::error::{BootstrapError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Runs an external installer command, e.g. `pip install -r {manifest}`.
///
/// `{manifest}`, `{layer}` and `{workdir}` in the argv are replaced with the
/// paths of the current build. The command runs inside the working directory.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    argv: Vec<String>,
}

impl CommandInstaller {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

pub fn expand_placeholders(arg: &str, vars: &[(&str, &Path)]) -> String {
    vars.iter().fold(arg.to_string(), |acc, (key, path)| {
        acc.replace(&format!("{{{}}}", key), &path.to_string_lossy())
    })
}

#[async_trait]
impl Installer for CommandInstaller {
    fn fingerprint(&self) -> String {
        self.argv.join("\u{1f}")
    }

    async fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
        let vars = [
            ("manifest", request.manifest_path),
            ("layer", request.layer),
            ("workdir", request.workdir),
        ];
        let argv: Vec<String> = self
            .argv
            .iter()
            .map(|arg| expand_placeholders(arg, &vars))
            .collect();
        let (program, args) = argv.split_first().ok_or_else(|| {
            BootstrapError::MissingConfigError {
                field: "build.install".to_string(),
            }
        })?;

        tracing::info!(
            "📦 Installing {} package(s): {}",
            request.manifest.requirements.len(),
            argv.join(" ")
        );

        let output = Command::new(program)
            .args(args)
            .current_dir(request.workdir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BootstrapError::InstallFailed {
                program: program.clone(),
                code: -1,
                detail: format!("cannot execute installer: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            tracing::debug!("{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BootstrapError::InstallFailed {
                program: program.clone(),
                code: output.status.code().unwrap_or(-1),
                detail: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}
