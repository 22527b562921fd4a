use crate::config::recipe::RecipeConfig;
use crate::core::base::select_environment;
use crate::core::context::{copy_context, copy_file_into, reset_dir};
use crate::core::image::{save_image, ImageLayout, IMAGE_METADATA};
use crate::core::layer_cache;
use crate::core::manifest::parse_manifest;
use crate::domain::model::{BuildReport, ImageConfig, Step, StepOutcome, StepStatus};
use crate::domain::ports::{InstallRequest, Installer, Storage};
use crate::utils::error::{BootstrapError, Result};
use crate::utils::validation::Validate;
use std::collections::BTreeMap;

/// Runs build steps 1 to 7 of a recipe and writes the image.
pub struct ImageBuilder<I: Installer> {
    recipe: RecipeConfig,
    installer: I,
}

impl<I: Installer> ImageBuilder<I> {
    pub fn new(recipe: RecipeConfig, installer: I) -> Self {
        Self { recipe, installer }
    }

    pub fn recipe(&self) -> &RecipeConfig {
        &self.recipe
    }

    pub fn layout(&self) -> ImageLayout {
        ImageLayout::new(self.recipe.output_dir())
    }

    /// 不執行任何步驟，只列出會做的事
    pub fn describe_plan(&self) -> Vec<String> {
        let layout = self.layout();
        let workdir = layout.workdir(self.recipe.workdir());
        let runtime_env = self
            .recipe
            .runtime_config()
            .map(|rt| rt.to_env(&self.recipe.env_names()))
            .unwrap_or_default();
        let env: Vec<String> = runtime_env
            .into_iter()
            .chain(self.recipe.extra_env())
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        Step::ALL
            .iter()
            .map(|step| {
                let detail = match step {
                    Step::SelectEnvironment => format!(
                        "{} {}",
                        self.recipe.base.runtime,
                        self.recipe.base.version.as_deref().unwrap_or("(any version)")
                    ),
                    Step::EstablishWorkdir => workdir.display().to_string(),
                    Step::CopyManifest => self.recipe.manifest_path().display().to_string(),
                    Step::InstallDependencies => self.recipe.install_command().join(" "),
                    Step::CopySources => self.recipe.context_dir().display().to_string(),
                    Step::ExposePort => format!("{}/tcp", self.recipe.network.expose),
                    Step::BindEnvironment => env.join(" "),
                    Step::Launch => self.recipe.launch.command.join(" "),
                };
                format!("{}: {}", step, detail)
            })
            .collect()
    }

    pub async fn build(&self) -> Result<BuildReport> {
        let recipe = &self.recipe;
        let layout = self.layout();
        let storage = layout.storage();
        let mut steps = Vec::new();
        recipe.validate()?;

        tracing::info!(
            "🔨 Building image '{}' into {}",
            recipe.image.name,
            layout.root().display()
        );

        // 舊的 image.json 先移除，建置失敗時不會留下可執行的映像
        storage.remove_file(IMAGE_METADATA).await?;

        tracing::info!("{}", Step::SelectEnvironment);
        let base = select_environment(
            &recipe.base.runtime,
            &recipe.version_args(),
            recipe.base.version.as_deref(),
        )
        .await?;
        steps.push(executed(Step::SelectEnvironment));

        tracing::info!("{}", Step::EstablishWorkdir);
        let workdir = layout.workdir(recipe.workdir());
        reset_dir(&workdir)?;
        steps.push(executed(Step::EstablishWorkdir));

        tracing::info!("{}", Step::CopyManifest);
        let manifest_src = recipe.manifest_path();
        if !manifest_src.is_file() {
            return Err(BootstrapError::ManifestMissing { path: manifest_src });
        }
        let manifest_bytes = std::fs::read(&manifest_src)?;
        let manifest = parse_manifest(&String::from_utf8_lossy(&manifest_bytes))?;
        let manifest_path = copy_file_into(&manifest_src, &workdir)?;
        steps.push(executed(Step::CopyManifest));

        tracing::info!("{}", Step::InstallDependencies);
        let key = layer_cache::layer_key(
            &manifest_bytes,
            &self.installer.fingerprint(),
            &base.runtime,
            &base.version,
        );
        if layer_cache::is_fresh(&storage, &key).await {
            tracing::info!("♻️  Manifest unchanged, reusing dependency layer");
            steps.push(StepOutcome {
                step: Step::InstallDependencies,
                status: StepStatus::Cached,
            });
        } else {
            layer_cache::invalidate(&storage).await?;
            let layer = layout.deps_layer();
            reset_dir(&layer)?;
            self.installer
                .install(&InstallRequest {
                    manifest_path: &manifest_path,
                    manifest: &manifest,
                    layer: &layer,
                    workdir: &workdir,
                })
                .await?;
            layer_cache::record(&storage, &key).await?;
            steps.push(executed(Step::InstallDependencies));
        }

        tracing::info!("{}", Step::CopySources);
        let stats = copy_context(
            &recipe.context_dir(),
            &workdir,
            &[layout.root().to_path_buf()],
        )?;
        tracing::debug!(
            "Copied {} files, {} directories ({} bytes)",
            stats.files,
            stats.dirs,
            stats.bytes
        );
        steps.push(executed(Step::CopySources));

        tracing::info!("{}", Step::ExposePort);
        let exposed_ports = vec![recipe.exposed_port()?];
        steps.push(executed(Step::ExposePort));

        tracing::info!("{}", Step::BindEnvironment);
        let env_names = recipe.env_names();
        let runtime = recipe.runtime_config()?;
        let mut env: BTreeMap<String, String> = recipe.extra_env();
        env.extend(runtime.to_env(&env_names));
        steps.push(executed(Step::BindEnvironment));

        let image = ImageConfig {
            name: recipe.image.name.clone(),
            created: chrono::Utc::now(),
            base,
            workdir: recipe.workdir().to_string(),
            exposed_ports,
            env,
            env_names,
            command: recipe.launch.command.clone(),
            manifest_digest: layer_cache::manifest_digest(&manifest_bytes),
            packages: manifest
                .requirements
                .iter()
                .map(|r| r.to_string())
                .collect(),
        };
        save_image(&storage, &image).await?;

        tracing::info!("✅ Image '{}' built", image.name);
        Ok(BuildReport { image, steps })
    }
}

fn executed(step: Step) -> StepOutcome {
    StepOutcome {
        step,
        status: StepStatus::Executed,
    }
}
