use appbox::config::{BuildArgs, Command, LogFormat};
use appbox::core::image::load_image;
use appbox::utils::logger;
use appbox::utils::validation::Validate;
use appbox::{
    run_image, BootstrapEngine, BootstrapError, CliConfig, CommandInstaller, ImageBuilder,
    ImageLayout, RecipeConfig,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    match config.log_format {
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(config.verbose),
    }

    tracing::debug!("CLI config: {:?}", config);

    let exit_code = match execute(config.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(
                "❌ {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            e.exit_code()
        }
    };

    // 結束碼原樣傳回給呼叫端
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn execute(command: Command) -> Result<i32, BootstrapError> {
    match command {
        Command::Build(args) => {
            let builder = load_builder(&args)?;
            if args.dry_run {
                print_plan(&builder);
                return Ok(0);
            }
            let mut engine = BootstrapEngine::new(builder);
            let report = engine.build().await?;
            println!("✅ Built image '{}'", report.image.name);
            println!("📁 {}", engine.layout().root().display());
            Ok(0)
        }
        Command::Run(args) => run_image(&ImageLayout::new(&args.image), &args.env).await,
        Command::Up { build, env } => {
            let builder = load_builder(&build)?;
            if build.dry_run {
                print_plan(&builder);
                return Ok(0);
            }
            let mut engine = BootstrapEngine::new(builder);
            engine.build().await?;
            engine.run(&env).await
        }
        Command::Inspect { image } => {
            let image = load_image(&ImageLayout::new(&image)).await?;
            println!("{}", serde_json::to_string_pretty(&image)?);
            Ok(0)
        }
    }
}

fn load_builder(args: &BuildArgs) -> Result<ImageBuilder<CommandInstaller>, BootstrapError> {
    tracing::info!("📁 Loading recipe from: {}", args.recipe.display());
    let mut recipe = RecipeConfig::from_file(&args.recipe)?;

    // 命令列覆蓋配方設定
    if let Some(output) = &args.output {
        let output = if output.is_absolute() {
            output.clone()
        } else {
            std::env::current_dir()?.join(output)
        };
        recipe.image.output = Some(output.to_string_lossy().into_owned());
        tracing::info!("🔧 Output overridden to: {}", output.display());
    }

    // 驗證配方
    recipe.validate()?;
    tracing::info!("✅ Recipe loaded and validated");

    let installer = CommandInstaller::new(recipe.install_command());
    Ok(ImageBuilder::new(recipe, installer))
}

fn print_plan(builder: &ImageBuilder<CommandInstaller>) {
    tracing::info!("🔍 DRY RUN MODE - nothing will be executed");
    println!("📋 Build plan for '{}':", builder.recipe().image.name);
    for line in builder.describe_plan() {
        println!("  {}", line);
    }
}
