mod analysis;
mod api;
mod client;
mod config;
mod gemini;
mod llm;
mod markdown;
mod models;
mod normalize;
mod openai;
mod prompt;
mod utils;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client::{ApiClient, History};
use config::{Config, Provider};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use models::{DEFAULT_LANGUAGE, LANGUAGES};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "AI-assisted code complexity analysis service and client")]
struct Args {
    /// Project directory holding .complexity-ai.yml
    #[arg(short, long, default_value = ".")]
    path: String,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP analysis service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// gemini or openai
        #[arg(long)]
        provider: Option<String>,
        /// Provider base URL
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        /// Model identifier; repeat to set the fallback order
        #[arg(long = "model")]
        models: Vec<String>,
    },
    /// Analyze a source file (or stdin) through a running service
    Analyze {
        /// Source file; reads stdin when omitted
        file: Option<PathBuf>,
        #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        #[arg(short, long, value_enum, default_value_t = Mode::Calculate)]
        mode: Mode,
        /// Service base URL (defaults to the configured server_url)
        #[arg(long)]
        server: Option<String>,
        /// Print JSON instead of markdown
        #[arg(long)]
        json: bool,
        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Interactive analysis session with history
    Session {
        #[arg(long)]
        server: Option<String>,
    },
    /// Create a project configuration
    Init,
    /// Edit configuration interactively
    Config {
        /// Use the global configuration
        #[arg(short, long)]
        global: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Calculate,
    BigO,
    Optimize,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let project_path = PathBuf::from(&args.path);
    if !project_path.exists() {
        error!("path does not exist: {}", project_path.display());
        return Err(anyhow!("path does not exist: {}", project_path.display()));
    }

    match args.command {
        Commands::Serve {
            host,
            port,
            provider,
            api_url,
            api_key,
            models,
        } => {
            let mut config = Config::load(&project_path)?.with_process_env()?;
            if let Some(provider) = provider {
                let provider: Provider = provider.parse()?;
                config.select_provider(provider, |key| std::env::var(key).ok());
            }
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if api_url.is_some() {
                config.api_url = api_url;
            }
            if let Some(key) = api_key {
                config.api_key = key;
            }
            if !models.is_empty() {
                config.models = models;
            }
            api::start_server(config).await?;
        }
        Commands::Analyze {
            file,
            language,
            mode,
            server,
            json,
            output,
        } => {
            let code = read_source(file.as_deref())?;
            if code.trim().is_empty() {
                return Err(anyhow!("no code to analyze"));
            }
            let client = ApiClient::new(&server_url(&project_path, server)?)?;
            let report = run_analysis(&client, mode, &code, &language, json).await?;
            println!("{}", report);
            if let Some(path) = output {
                markdown::write_report(&report, &path)?;
            }
        }
        Commands::Session { server } => {
            let client = ApiClient::new(&server_url(&project_path, server)?)?;
            run_session(&client).await?;
        }
        Commands::Init => {
            config::init_project(&project_path)?;
        }
        Commands::Config { global } => {
            config::configure_interactive(&project_path, global)?;
        }
    }

    Ok(())
}

fn server_url(project_path: &Path, explicit: Option<String>) -> Result<String> {
    match explicit {
        Some(url) => Ok(url),
        None => Ok(Config::load(project_path)?.with_process_env()?.server_url),
    }
}

fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow!("cannot read {}: {}", path.display(), e)),
        None => {
            let mut code = String::new();
            std::io::stdin().read_to_string(&mut code)?;
            Ok(code)
        }
    }
}

async fn run_analysis(
    client: &ApiClient,
    mode: Mode,
    code: &str,
    language: &str,
    as_json: bool,
) -> Result<String> {
    let rendered = match mode {
        Mode::Calculate => {
            let report = client.calculate(code, language).await?;
            if as_json {
                serde_json::to_string_pretty(&report)?
            } else {
                markdown::render_complexity(&report, language)
            }
        }
        Mode::BigO => {
            let report = client.big_o(code, language).await?;
            if as_json {
                serde_json::to_string_pretty(&report)?
            } else {
                markdown::render_big_o(&report)
            }
        }
        Mode::Optimize => {
            let report = client.optimize(code, language).await?;
            if as_json {
                serde_json::to_string_pretty(&report)?
            } else {
                markdown::render_optimizations(&report)
            }
        }
        Mode::All => {
            let (complexity, big_o, optimizations) = tokio::try_join!(
                client.calculate(code, language),
                client.big_o(code, language),
                client.optimize(code, language),
            )?;
            if as_json {
                serde_json::to_string_pretty(&json!({
                    "analysis": complexity,
                    "bigO": big_o,
                    "optimizations": optimizations,
                }))?
            } else {
                [
                    markdown::render_complexity(&complexity, language),
                    markdown::render_big_o(&big_o),
                    markdown::render_optimizations(&optimizations),
                ]
                .join("\n")
            }
        }
    };
    Ok(rendered)
}

const SESSION_ACTIONS: &[&str] = &[
    "Load code from file",
    "Analyze complexity",
    "Big O analysis",
    "Optimization suggestions",
    "Change language",
    "Show history",
    "Quit",
];

async fn run_session(client: &ApiClient) -> Result<()> {
    let theme = ColorfulTheme::default();
    match client.ping().await {
        Ok(probe) => info!("connected: {}", probe["message"].as_str().unwrap_or("ok")),
        Err(e) => warn!("service did not answer the liveness probe: {}", e),
    }

    let mut history = History::new();
    let mut language = DEFAULT_LANGUAGE.to_string();
    let mut code = String::new();

    loop {
        let choice = Select::with_theme(&theme)
            .with_prompt(format!("Language: {}", language))
            .items(SESSION_ACTIONS)
            .default(0)
            .interact()?;

        match choice {
            0 => {
                let path: String = Input::with_theme(&theme)
                    .with_prompt("Source file")
                    .interact_text()?;
                match read_source(Some(Path::new(path.trim()))) {
                    Ok(loaded) => {
                        println!("Loaded {} lines", utils::line_count(&loaded));
                        code = loaded;
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            1..=3 if code.trim().is_empty() => {
                eprintln!("Please load some code first");
            }
            1 => match client.calculate(&code, &language).await {
                Ok(report) => {
                    history.record(&report, &code);
                    println!("{}", markdown::render_complexity(&report, &language));
                }
                Err(e) => eprintln!("{}", e),
            },
            2 => match client.big_o(&code, &language).await {
                Ok(report) => println!("{}", markdown::render_big_o(&report)),
                Err(e) => eprintln!("{}", e),
            },
            3 => match client.optimize(&code, &language).await {
                Ok(report) => println!("{}", markdown::render_optimizations(&report)),
                Err(e) => eprintln!("{}", e),
            },
            4 => {
                let labels: Vec<&str> = LANGUAGES.iter().map(|(_, label)| *label).collect();
                let current = LANGUAGES
                    .iter()
                    .position(|(tag, _)| *tag == language)
                    .unwrap_or(0);
                let picked = Select::with_theme(&theme)
                    .with_prompt("Language")
                    .items(&labels)
                    .default(current)
                    .interact()?;
                language = LANGUAGES[picked].0.to_string();
            }
            5 => println!("{}", markdown::render_history(&history)),
            _ => break,
        }
    }
    Ok(())
}
