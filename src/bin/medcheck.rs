//! CLI for medcheck - medicine package safety summaries.

use clap::{Args, Parser, Subcommand, ValueEnum};
use medcheck::analyzer::VisionAnalyzer;
use medcheck::config::{config_file_path, load_config};
use medcheck::panel::failure_message;
use medcheck::{Config, GeminiAnalyzer, GeminiModel, ImageSource, MedicineChecker, PromptLanguage};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medcheck")]
#[command(about = "Photograph a medicine package and get a safety summary from Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: $MEDCHECK_CONFIG or <config dir>/medcheck/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(flatten)]
    overrides: Overrides,
}

/// Settings that override the config file.
#[derive(Args)]
struct Overrides {
    /// Gemini model (e.g. gemini-2.5-flash)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Summary language
    #[arg(long, global = true, value_enum)]
    lang: Option<LangArg>,

    /// Longest edge of the uploaded photo in pixels
    #[arg(long, global = true)]
    max_dimension: Option<u32>,

    /// Retries on transient API failures
    #[arg(long, global = true)]
    retries: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one photo and print the summary
    Check(CheckArgs),

    /// Interactive session with a photo source menu (default)
    Interactive,

    /// List available Gemini models
    Models,

    /// Verify the API key and model are usable
    Health,

    /// Show the config file path and effective settings
    Config,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct CheckArgs {
    /// Existing photo of the package
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Take a new photo with the camera
    #[arg(short, long)]
    camera: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LangArg {
    En,
    Zh,
}

impl From<LangArg> for PromptLanguage {
    fn from(arg: LangArg) -> Self {
        match arg {
            LangArg::En => PromptLanguage::English,
            LangArg::Zh => PromptLanguage::Chinese,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config_file_path);
    let mut config = load_config(&config_path)?;
    apply_overrides(&mut config, &cli.overrides);

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Check(args) => check(args, &config, cli.json).await?,
        Commands::Interactive => {
            let checker = MedicineChecker::from_config(build_analyzer(&config)?, &config);
            medcheck::repl::run(&checker).await?;
        }
        Commands::Models => list_models(&config, cli.json)?,
        Commands::Health => health(&config, cli.json).await?,
        Commands::Config => show_config(&config_path, &config, cli.json)?,
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(model) = &overrides.model {
        config.gemini.model = Some(model.clone());
    }
    if let Some(lang) = overrides.lang {
        config.prompt.language = lang.into();
    }
    if let Some(max) = overrides.max_dimension {
        config.image.max_dimension = max;
    }
    if let Some(retries) = overrides.retries {
        config.retries = retries;
    }
}

fn build_analyzer(config: &Config) -> anyhow::Result<GeminiAnalyzer> {
    let mut builder = GeminiAnalyzer::builder();
    if let Some(key) = &config.gemini.api_key {
        builder = builder.api_key(key);
    }
    if let Some(model) = &config.gemini.model {
        builder = builder.model(model.parse::<GeminiModel>()?);
    }
    if let Some(url) = &config.gemini.base_url {
        builder = builder.base_url(url);
    }
    if let Some(timeout) = config.gemini_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

async fn check(args: CheckArgs, config: &Config, json_output: bool) -> anyhow::Result<()> {
    let source = match args.image {
        Some(path) => ImageSource::gallery(path),
        None => ImageSource::Camera,
    };

    let checker = MedicineChecker::from_config(build_analyzer(config)?, config);

    let bar = (!json_output).then(|| {
        medcheck::repl::spinner(match source {
            ImageSource::Camera => "Taking photo and analyzing...",
            ImageSource::Gallery { .. } => "Analyzing photo...",
        })
    });
    let result = tokio::select! {
        result = checker.check(&source) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let Some(result) = result else {
        eprintln!("Interrupted.");
        std::process::exit(130);
    };

    match result {
        Ok(analysis) => {
            if json_output {
                let out = serde_json::json!({
                    "success": true,
                    "source": source,
                    "text": analysis.text,
                    "provider": analysis.provider.to_string(),
                    "model": analysis.metadata.model,
                    "duration_ms": analysis.metadata.duration_ms,
                    "finish_reason": analysis.metadata.finish_reason,
                    "prompt_tokens": analysis.metadata.prompt_tokens,
                    "response_tokens": analysis.metadata.response_tokens,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", analysis.text);
                if let Some(duration) = analysis.metadata.duration_ms {
                    eprintln!("\n({} in {}ms)", analysis.metadata.model.as_deref().unwrap_or("gemini"), duration);
                }
            }
            Ok(())
        }
        Err(e) => {
            let message = failure_message(&e)
                .unwrap_or_else(|| "Capture cancelled; no photo was taken.".to_string());
            if json_output {
                let out = serde_json::json!({
                    "success": false,
                    "source": source,
                    "error": message,
                    "retryable": e.is_retryable(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                std::process::exit(1);
            }
            anyhow::bail!(message)
        }
    }
}

async fn health(config: &Config, json_output: bool) -> anyhow::Result<()> {
    let analyzer = build_analyzer(config)?;
    let result = analyzer.health_check().await;

    if json_output {
        let out = serde_json::json!({
            "provider": analyzer.kind().to_string(),
            "model": analyzer.model().as_str(),
            "healthy": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", health_line(analyzer.name(), analyzer.model(), &result));
    }

    // Already reported above; exit without a second copy of the error.
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn health_line(name: &str, model: GeminiModel, result: &medcheck::Result<()>) -> String {
    match result {
        Ok(()) => format!("✓ {name} ({model}) is reachable"),
        Err(e) => format!("✗ {name} ({model}): {e}"),
    }
}

fn list_models(config: &Config, json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ModelInfo {
        id: &'static str,
        description: &'static str,
        selected: bool,
    }

    let selected = match &config.gemini.model {
        Some(m) => m.parse::<GeminiModel>()?,
        None => GeminiModel::default(),
    };
    let models: Vec<ModelInfo> = GeminiModel::ALL
        .iter()
        .map(|m| ModelInfo {
            id: m.as_str(),
            description: m.description(),
            selected: *m == selected,
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        println!("Gemini models (API key: GEMINI_API_KEY or GOOGLE_API_KEY):\n");
        for m in &models {
            let marker = if m.selected { "*" } else { " " };
            println!("  {} {:<24} {}", marker, m.id, m.description);
        }
    }

    Ok(())
}

fn show_config(path: &std::path::Path, config: &Config, json_output: bool) -> anyhow::Result<()> {
    let redacted = config.redacted();
    if json_output {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "capture_dir": config.capture_dir().display().to_string(),
            "config": redacted,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let state = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("Config file: {}{}", path.display(), state);
        println!("Capture dir: {}\n", config.capture_dir().display());
        print!("{}", toml::to_string_pretty(&redacted)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcheck::MedCheckError;

    #[test]
    fn test_health_line() {
        assert_eq!(
            health_line("Gemini (Google)", GeminiModel::Flash, &Ok(())),
            "✓ Gemini (Google) (gemini-2.5-flash) is reachable"
        );
        let failed = Err(MedCheckError::Auth("Invalid API key".into()));
        assert_eq!(
            health_line("Gemini (Google)", GeminiModel::Pro, &failed),
            "✗ Gemini (Google) (gemini-2.5-pro): authentication failed: Invalid API key"
        );
    }

    #[test]
    fn test_check_requires_one_source() {
        assert!(Cli::try_parse_from(["medcheck", "check"]).is_err());
        assert!(Cli::try_parse_from(["medcheck", "check", "-i", "a.jpg", "--camera"]).is_err());
        assert!(Cli::try_parse_from(["medcheck", "check", "--camera"]).is_ok());
    }
}
