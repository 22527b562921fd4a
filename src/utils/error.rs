use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Base environment '{runtime}' unavailable: {reason}")]
    BaseEnvironmentError { runtime: String, reason: String },

    #[error("Dependency manifest not found: {}", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("Invalid requirement on line {line} ('{content}'): {reason}")]
    InvalidRequirement {
        line: usize,
        content: String,
        reason: String,
    },

    #[error("Dependency installation failed ({program} exited with {code}): {detail}")]
    InstallFailed {
        program: String,
        code: i32,
        detail: String,
    },

    #[error("Build context not found: {}", path.display())]
    ContextMissing { path: PathBuf },

    #[error("No built image at {}", path.display())]
    ImageNotBuilt { path: PathBuf },

    #[error("Entry point '{}' not found in working directory {}", entry_point.display(), workdir.display())]
    EntryPointMissing {
        entry_point: PathBuf,
        workdir: PathBuf,
    },

    #[error("Failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot bind {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidState { from: String, to: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Build,
    Launch,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BootstrapError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::BaseEnvironmentError { .. }
            | Self::ManifestMissing { .. }
            | Self::InvalidRequirement { .. }
            | Self::InstallFailed { .. }
            | Self::ContextMissing { .. } => ErrorCategory::Build,
            Self::ImageNotBuilt { .. }
            | Self::EntryPointMissing { .. }
            | Self::SpawnFailed { .. }
            | Self::BindFailed { .. } => ErrorCategory::Launch,
            Self::IoError(_) | Self::SerializationError(_) | Self::InvalidState { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Build | ErrorCategory::Launch => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 對應的行程結束碼
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SpawnFailed { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => 127,
                _ => 126,
            },
            _ => match self.category() {
                ErrorCategory::Build | ErrorCategory::Launch => 1,
                ErrorCategory::Configuration => 2,
                ErrorCategory::System => 3,
            },
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Check the recipe file for syntax errors and required sections".to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}' in the recipe", field)
            }
            Self::MissingConfigError { field } => {
                format!("Add '{}' to the recipe or the environment", field)
            }
            Self::BaseEnvironmentError { runtime, .. } => format!(
                "Install '{}' (or adjust [base] in the recipe) so that it is on PATH",
                runtime
            ),
            Self::ManifestMissing { .. } => {
                "Create the dependency manifest or point [build].manifest at it".to_string()
            }
            Self::InvalidRequirement { line, .. } => {
                format!("Fix line {} of the dependency manifest", line)
            }
            Self::InstallFailed { .. } => {
                "Make sure every package in the manifest exists and versions are compatible"
                    .to_string()
            }
            Self::ContextMissing { .. } => {
                "Point [build].context at the application source tree".to_string()
            }
            Self::ImageNotBuilt { .. } => "Run `appbox build` first".to_string(),
            Self::EntryPointMissing { .. } => {
                "Add the entry point file to the build context and rebuild".to_string()
            }
            Self::SpawnFailed { program, .. } => {
                format!("Make sure '{}' is installed and executable", program)
            }
            Self::BindFailed { .. } => {
                "Stop the process holding the port or choose another port".to_string()
            }
            Self::InvalidState { .. } => "Start a new build".to_string(),
            Self::IoError(_) => "Check file permissions and available disk space".to_string(),
            Self::SerializationError(_) => {
                "The image metadata is corrupt; rebuild the image".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Build => format!("Build failed: {}", self),
            ErrorCategory::Launch => format!("Launch failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

impl From<toml::de::Error> for BootstrapError {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
