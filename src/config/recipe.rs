use crate::config::runtime::{EnvNames, RuntimeConfig};
use crate::utils::error::{BootstrapError, Result};
use crate::utils::validation::{
    validate_command, validate_env_name, validate_host, validate_non_empty_string, validate_path,
    validate_port, validate_relative_path, validate_workdir, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT: &str = ".appbox/image";
pub const DEFAULT_WORKDIR: &str = "/app";
pub const DEFAULT_MANIFEST: &str = "requirements.txt";
pub const DEFAULT_CONTEXT: &str = ".";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeConfig {
    pub image: ImageSection,
    pub base: BaseSection,
    pub build: BuildSection,
    pub network: NetworkSection,
    pub env: EnvSection,
    pub launch: LaunchSection,
    /// 配方檔所在目錄，相對路徑以此為基準
    #[serde(skip)]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSection {
    pub name: String,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseSection {
    pub runtime: String,
    pub version: Option<String>,
    pub version_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    pub workdir: Option<String>,
    pub manifest: Option<String>,
    pub context: Option<String>,
    pub install: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    pub expose: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSection {
    pub entry_point: String,
    pub host: String,
    pub port: u32,
    pub entry_point_var: Option<String>,
    pub host_var: Option<String>,
    pub port_var: Option<String>,
    pub extra: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSection {
    pub command: Vec<String>,
}

impl RecipeConfig {
    /// 從 TOML 檔案載入配方
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BootstrapError::config(format!(
                "Recipe file not found: {}",
                path.display()
            )),
            _ => BootstrapError::IoError(e),
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// 從 TOML 字串解析配方
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_vars(content, |name| std::env::var(name).ok())?;
        let mut config: Self = toml::from_str(&processed_content)?;
        config.root = PathBuf::from(".");
        Ok(config)
    }

    /// 替換環境變數 (例如 ${API_KEY})，未定義的保持原樣
    fn substitute_vars<F>(content: &str, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| BootstrapError::config(format!("Invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("image.name", &self.image.name)?;
        validate_path("image.output", self.output_setting())?;

        validate_non_empty_string("base.runtime", &self.base.runtime)?;
        if let Some(version) = &self.base.version {
            validate_non_empty_string("base.version", version)?;
        }

        validate_workdir("build.workdir", self.workdir())?;
        validate_path("build.manifest", self.manifest_setting())?;
        validate_path("build.context", self.context_setting())?;
        validate_command("build.install", &self.install_command())?;

        let exposed = validate_port("network.expose", self.network.expose)?;

        validate_relative_path("env.entry_point", &self.env.entry_point)?;
        validate_host("env.host", &self.env.host)?;
        let bound = validate_port("env.port", self.env.port)?;
        self.env_names().validate()?;
        for name in self.extra_env().keys() {
            validate_env_name("env.extra", name)?;
        }

        // 宣告的埠與綁定的埠必須一致
        if exposed != bound {
            return Err(BootstrapError::ConfigValidationError {
                field: "env.port".to_string(),
                message: format!(
                    "bind port {} does not match exposed port {}",
                    bound, exposed
                ),
            });
        }

        validate_command("launch.command", &self.launch.command)?;

        Ok(())
    }

    fn output_setting(&self) -> &str {
        self.image.output.as_deref().unwrap_or(DEFAULT_OUTPUT)
    }

    fn manifest_setting(&self) -> &str {
        self.build.manifest.as_deref().unwrap_or(DEFAULT_MANIFEST)
    }

    fn context_setting(&self) -> &str {
        self.build.context.as_deref().unwrap_or(DEFAULT_CONTEXT)
    }

    fn resolve(&self, setting: &str) -> PathBuf {
        let path = Path::new(setting);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// 映像輸出目錄
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(self.output_setting())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(self.manifest_setting())
    }

    pub fn context_dir(&self) -> PathBuf {
        self.resolve(self.context_setting())
    }

    pub fn workdir(&self) -> &str {
        self.build.workdir.as_deref().unwrap_or(DEFAULT_WORKDIR)
    }

    pub fn install_command(&self) -> Vec<String> {
        self.build.install.clone().unwrap_or_else(|| {
            [
                "pip",
                "install",
                "--no-cache-dir",
                "--target",
                "{layer}",
                "-r",
                "{manifest}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect()
        })
    }

    pub fn version_args(&self) -> Vec<String> {
        self.base
            .version_args
            .clone()
            .unwrap_or_else(|| vec!["--version".to_string()])
    }

    /// 宣告的埠；超出範圍時回報錯誤而不是截斷
    pub fn exposed_port(&self) -> Result<u16> {
        validate_port("network.expose", self.network.expose)
    }

    pub fn env_names(&self) -> EnvNames {
        let defaults = EnvNames::default();
        EnvNames {
            entry_point: self
                .env
                .entry_point_var
                .clone()
                .unwrap_or(defaults.entry_point),
            host: self.env.host_var.clone().unwrap_or(defaults.host),
            port: self.env.port_var.clone().unwrap_or(defaults.port),
        }
    }

    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        let host = validate_host("env.host", &self.env.host)?;
        let port = validate_port("env.port", self.env.port)?;
        RuntimeConfig::new(self.env.entry_point.as_str(), host, port)
    }

    pub fn extra_env(&self) -> BTreeMap<String, String> {
        self.env.extra.clone().unwrap_or_default()
    }
}

impl Validate for RecipeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC_RECIPE: &str = r#"
[image]
name = "resume-ats"

[base]
runtime = "python3"
version = "3.9"

[build]
workdir = "/app"

[network]
expose = 5000

[env]
entry_point = "app.py"
host = "0.0.0.0"
port = 5000
entry_point_var = "FLASK_APP"
host_var = "FLASK_RUN_HOST"
port_var = "FLASK_RUN_PORT"

[launch]
command = ["flask", "run"]
"#;

    #[test]
    fn test_parse_basic_recipe() {
        let config = RecipeConfig::from_toml_str(BASIC_RECIPE).unwrap();

        assert_eq!(config.image.name, "resume-ats");
        assert_eq!(config.workdir(), "/app");
        assert_eq!(config.exposed_port().unwrap(), 5000);
        assert_eq!(config.manifest_path(), PathBuf::from("./requirements.txt"));
        assert_eq!(config.env_names().port, "FLASK_RUN_PORT");
        assert_eq!(config.install_command()[0], "pip");
        assert_eq!(config.version_args(), vec!["--version".to_string()]);
        assert!(config.validate().is_ok());

        let runtime = config.runtime_config().unwrap();
        assert_eq!(runtime.socket_addr().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_env_var_substitution() {
        let content = BASIC_RECIPE.replace("\"resume-ats\"", "\"${IMAGE_NAME}-${MISSING}\"");
        let processed = RecipeConfig::substitute_vars(&content, |name| {
            (name == "IMAGE_NAME").then(|| "substituted".to_string())
        })
        .unwrap();

        let config: RecipeConfig = toml::from_str(&processed).unwrap();
        assert_eq!(config.image.name, "substituted-${MISSING}");
    }

    #[test]
    fn test_exposed_port_out_of_range_is_an_error() {
        let content = BASIC_RECIPE.replace("expose = 5000", "expose = 70000");
        let config = RecipeConfig::from_toml_str(&content).unwrap();
        let err = config.exposed_port().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_entry_point_outside_workdir_fails_validation() {
        for entry in ["/etc/hostname", "../app.py"] {
            let content = BASIC_RECIPE.replace(
                "entry_point = \"app.py\"",
                &format!("entry_point = \"{}\"", entry),
            );
            let config = RecipeConfig::from_toml_str(&content).unwrap();
            let err = config.validate().unwrap_err();
            assert_eq!(err.exit_code(), 2, "{} should be rejected", entry);
        }
    }

    #[test]
    fn test_unknown_env_var_is_left_verbatim() {
        let content = BASIC_RECIPE.replace(
            "[launch]",
            "[env.extra]\nPYTHONPATH = \"${APPBOX_TEST_UNSET_VARIABLE}\"\n\n[launch]",
        );
        let config = RecipeConfig::from_toml_str(&content).unwrap();
        assert_eq!(
            config.extra_env()["PYTHONPATH"],
            "${APPBOX_TEST_UNSET_VARIABLE}"
        );
    }

    #[test]
    fn test_port_mismatch_fails_validation() {
        let content = BASIC_RECIPE.replace("port = 5000", "port = 8000");
        let config = RecipeConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not match exposed port"));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let relative_workdir = BASIC_RECIPE.replace("workdir = \"/app\"", "workdir = \"app\"");
        let config = RecipeConfig::from_toml_str(&relative_workdir).unwrap();
        assert!(config.validate().is_err());

        let bad_host = BASIC_RECIPE.replace("host = \"0.0.0.0\"", "host = \"anywhere\"");
        let config = RecipeConfig::from_toml_str(&bad_host).unwrap();
        assert!(config.validate().is_err());

        let empty_command = BASIC_RECIPE.replace("command = [\"flask\", \"run\"]", "command = []");
        let config = RecipeConfig::from_toml_str(&empty_command).unwrap();
        assert!(config.validate().is_err());

        let out_of_range = BASIC_RECIPE
            .replace("expose = 5000", "expose = 70000")
            .replace("port = 5000", "port = 70000");
        let config = RecipeConfig::from_toml_str(&out_of_range).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = RecipeConfig::from_toml_str("[image\nname = ").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_paths_resolve_against_recipe_directory() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC_RECIPE.as_bytes()).unwrap();

        let config = RecipeConfig::from_file(temp_file.path()).unwrap();
        let dir = temp_file.path().parent().unwrap();
        assert_eq!(config.context_dir(), dir.join("."));
        assert_eq!(config.output_dir(), dir.join(DEFAULT_OUTPUT));
        assert_eq!(config.manifest_path(), dir.join("requirements.txt"));
    }

    #[test]
    fn test_missing_recipe_file() {
        let err = RecipeConfig::from_file("/nonexistent/appbox.toml").unwrap_err();
        assert!(err.to_string().contains("Recipe file not found"));
    }
}
