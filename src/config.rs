use crate::utils::RetryPolicy;
use anyhow::{anyhow, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const CONFIG_FILE: &str = ".complexity-ai.yml";
const GLOBAL_CONFIG_DIR: &str = ".config/complexity-ai";

pub const GEMINI_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-flash-preview-09-2025",
];
pub const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn default_models(self) -> Vec<String> {
        let models = match self {
            Provider::Gemini => GEMINI_MODELS,
            Provider::OpenAi => OPENAI_MODELS,
        };
        models.iter().map(|m| m.to_string()).collect()
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(anyhow!("unknown provider: {} (expected gemini or openai)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Provider,
    /// Provider base URL; the provider's public endpoint when unset.
    pub api_url: Option<String>,
    pub api_key: String,
    /// Model identifiers tried in order on every call.
    pub models: Vec<String>,
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub rate_limit_per_minute: Option<u32>,
    /// When false, provider failures surface as HTTP 500 instead of a fallback record.
    pub absorb_provider_errors: bool,
    /// Where the terminal client reaches the service.
    pub server_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            api_url: None,
            api_key: String::new(),
            models: Provider::Gemini.default_models(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            timeout_secs: 30,
            max_retries: 2,
            retry_delay_ms: 500,
            rate_limit_per_minute: None,
            absorb_provider_errors: true,
            server_url: "http://localhost:5000".to_string(),
        }
    }
}

impl Config {
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load_file(&config_path)
        } else if let Some(global_config) = Self::load_global()? {
            Ok(global_config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read config {}: {}", path.display(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| anyhow!("failed to parse config {}: {}", path.display(), e))
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_yaml::to_string(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn load_global() -> Result<Option<Self>> {
        match dirs::home_dir() {
            Some(home) => {
                let global_config_path = home.join(GLOBAL_CONFIG_DIR).join(CONFIG_FILE);
                if global_config_path.exists() {
                    Ok(Some(Self::load_file(&global_config_path)?))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    pub fn save_global(&self) -> Result<()> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("could not locate home directory"))?;
        let global_config_dir = home.join(GLOBAL_CONFIG_DIR);
        fs::create_dir_all(&global_config_dir)?;
        let content = serde_yaml::to_string(self)?;
        fs::write(global_config_dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Env vars:
    /// - COMPLEXITY_AI_PROVIDER=gemini|openai
    /// - COMPLEXITY_AI_API_URL
    /// - COMPLEXITY_AI_MODELS=comma,list
    /// - COMPLEXITY_AI_PORT
    /// - GEMINI_API_KEY / OPENAI_API_KEY, matching the provider
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(val) = get("COMPLEXITY_AI_PROVIDER") {
            let provider: Provider = val.parse()?;
            if provider != self.provider && self.models == self.provider.default_models() {
                self.models = provider.default_models();
            }
            self.provider = provider;
        }
        if let Some(val) = get("COMPLEXITY_AI_API_URL") {
            self.api_url = Some(val);
        }
        if let Some(val) = get("COMPLEXITY_AI_MODELS") {
            let models: Vec<String> = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            if !models.is_empty() {
                self.models = models;
            }
        }
        if let Some(val) = get("COMPLEXITY_AI_PORT") {
            self.port = val
                .trim()
                .parse()
                .map_err(|e| anyhow!("invalid COMPLEXITY_AI_PORT {}: {}", val, e))?;
        }
        if let Some(val) = get(self.provider.api_key_env()) {
            self.api_key = val;
        }
        Ok(())
    }

    /// Switch to `provider`, swapping in its default models (unless custom
    /// models are set) and its own API key read through `lookup`.
    pub fn select_provider<F>(&mut self, provider: Provider, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if provider == self.provider {
            return;
        }
        if self.models == self.provider.default_models() {
            self.models = provider.default_models();
        }
        // A key loaded for the previous provider must never reach the new one.
        self.api_key = lookup(provider.api_key_env())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_default();
        self.provider = provider;
    }

    pub fn with_process_env(mut self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            timeout: (self.timeout_secs > 0).then_some(Duration::from_secs(self.timeout_secs)),
        }
    }
}

pub fn configure_interactive(project_dir: &Path, global: bool) -> Result<()> {
    let theme = ColorfulTheme::default();
    let current_config = if global {
        Config::load_global()?.unwrap_or_default()
    } else {
        Config::load(project_dir)?
    };
    println!("\n🔧 complexity-ai configuration");
    println!("==============================");
    if global {
        println!("Editing the global configuration\n");
    } else {
        println!("Editing the project configuration\n");
    }

    let providers = [Provider::Gemini, Provider::OpenAi];
    let provider_index = Select::with_theme(&theme)
        .with_prompt("Model provider")
        .default(if current_config.provider == Provider::OpenAi { 1 } else { 0 })
        .items(&providers)
        .interact()?;
    let provider = providers[provider_index];

    let api_url: String = Input::with_theme(&theme)
        .with_prompt("API URL (empty for the provider default)")
        .with_initial_text(current_config.api_url.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let api_key: String = Input::with_theme(&theme)
        .with_prompt("API key")
        .with_initial_text(&current_config.api_key)
        .allow_empty(true)
        .interact_text()?;

    let initial_models = if provider == current_config.provider {
        current_config.models.join(", ")
    } else {
        provider.default_models().join(", ")
    };
    let models: String = Input::with_theme(&theme)
        .with_prompt("Models, in fallback order (comma separated)")
        .with_initial_text(initial_models)
        .interact_text()?;
    let models: Vec<String> = models
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if models.is_empty() {
        return Err(anyhow!("at least one model is required"));
    }

    let port: u16 = Input::with_theme(&theme)
        .with_prompt("Server port")
        .default(current_config.port)
        .interact_text()?;

    let absorb_provider_errors = Confirm::with_theme(&theme)
        .with_prompt("Return fallback records when the provider fails?")
        .default(current_config.absorb_provider_errors)
        .interact()?;

    let new_config = Config {
        provider,
        api_url: Some(api_url).filter(|u| !u.trim().is_empty()),
        api_key,
        models,
        port,
        absorb_provider_errors,
        ..current_config
    };
    if global {
        new_config.save_global()?;
        info!("Global configuration updated");
    } else {
        new_config.save(project_dir)?;
        info!("Project configuration updated");
    }
    Ok(())
}

pub fn init_project(project_dir: &Path) -> Result<()> {
    let config_path = project_dir.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(anyhow!("config file already exists: {}", config_path.display()));
    }
    Config::default().save(project_dir)?;
    info!("Created config file: {}", config_path.display());

    // The file holds an API key, keep it out of version control.
    let gitignore_path = project_dir.join(".gitignore");
    if gitignore_path.exists() {
        let mut content = fs::read_to_string(&gitignore_path)?;
        if !content.lines().any(|l| l.trim() == CONFIG_FILE) {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(CONFIG_FILE);
            content.push('\n');
            fs::write(&gitignore_path, content)?;
            info!("Added {} to .gitignore", CONFIG_FILE);
        }
    } else {
        fs::write(&gitignore_path, format!("{}\n", CONFIG_FILE))?;
        info!("Created .gitignore with {}", CONFIG_FILE);
    }
    Ok(())
}
