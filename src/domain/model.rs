use crate::config::runtime::EnvNames;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One line of the dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub specifiers: Vec<VersionSpecifier>,
    /// Direct reference (`name @ url`), installed from the URL instead of an index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpecifier {
    pub op: String,
    pub version: String,
}

impl Requirement {
    /// 套件名稱比較時忽略大小寫，並把連續的 `-_.` 視為同一個分隔符
    pub fn normalized_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut last_sep = false;
        for c in self.name.chars() {
            if matches!(c, '-' | '_' | '.') {
                if !last_sep {
                    out.push('-');
                }
                last_sep = true;
            } else {
                out.push(c.to_ascii_lowercase());
                last_sep = false;
            }
        }
        out
    }

    /// The exact version when the requirement is pinned with `==` or `===`.
    pub fn pinned_version(&self) -> Option<&str> {
        match self.specifiers.as_slice() {
            [only] if only.op == "==" || only.op == "===" => Some(&only.version),
            _ => None,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let specs: Vec<String> = self
            .specifiers
            .iter()
            .map(|s| format!("{}{}", s.op, s.version))
            .collect();
        write!(f, "{}", specs.join(","))?;
        if let Some(url) = &self.url {
            // URL 後面的 marker 前必須有空白
            write!(f, " @ {}", url)?;
            if self.marker.is_some() {
                write!(f, " ")?;
            }
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub requirements: Vec<Requirement>,
    /// Installer option lines (`-r`, `--index-url`, ...), passed through untouched.
    pub directives: Vec<String>,
}

/// Metadata of a built image, persisted as `image.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub name: String,
    pub created: chrono::DateTime<chrono::Utc>,
    pub base: BaseInfo,
    pub workdir: String,
    pub exposed_ports: Vec<u16>,
    pub env: BTreeMap<String, String>,
    pub env_names: EnvNames,
    pub command: Vec<String>,
    pub manifest_digest: String,
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseInfo {
    pub runtime: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    SelectEnvironment,
    EstablishWorkdir,
    CopyManifest,
    InstallDependencies,
    CopySources,
    ExposePort,
    BindEnvironment,
    Launch,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::SelectEnvironment,
        Step::EstablishWorkdir,
        Step::CopyManifest,
        Step::InstallDependencies,
        Step::CopySources,
        Step::ExposePort,
        Step::BindEnvironment,
        Step::Launch,
    ];

    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::SelectEnvironment => "select base environment",
            Step::EstablishWorkdir => "establish working directory",
            Step::CopyManifest => "copy dependency manifest",
            Step::InstallDependencies => "install dependencies",
            Step::CopySources => "copy application sources",
            Step::ExposePort => "declare network port",
            Step::BindEnvironment => "bind environment",
            Step::Launch => "launch process",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.number(), Step::ALL.len(), self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Executed,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: Step,
    pub status: StepStatus,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub image: ImageConfig,
    pub steps: Vec<StepOutcome>,
}

impl BuildReport {
    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.steps.iter().find(|o| o.step == step).map(|o| o.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Unbuilt,
    Building,
    Built,
    Running,
    Exited(i32),
    Failed,
}

impl BootstrapState {
    /// 狀態只能往前走，沒有重啟或回滾
    pub fn can_transition_to(&self, next: BootstrapState) -> bool {
        use BootstrapState::*;
        matches!(
            (self, next),
            (Unbuilt, Building)
                | (Building, Built)
                | (Building, Failed)
                | (Built, Running)
                | (Built, Failed)
                | (Running, Exited(_))
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapState::Exited(_) | BootstrapState::Failed)
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapState::Unbuilt => write!(f, "unbuilt"),
            BootstrapState::Building => write!(f, "building"),
            BootstrapState::Built => write!(f, "built"),
            BootstrapState::Running => write!(f, "running"),
            BootstrapState::Exited(code) => write!(f, "exited({})", code),
            BootstrapState::Failed => write!(f, "failed"),
        }
    }
}
