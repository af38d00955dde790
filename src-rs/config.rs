use log::LevelFilter;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cons::provider_cons::LLMProvider;
use crate::error::{HarnessError, HarnessResult};
use crate::llm::tools::mcp::mcp_tool_client::McpClient;

/// Selects `appsettings.{Environment}.json`.
pub const ENVIRONMENT_VAR: &str = "BROWSERPILOT_ENVIRONMENT";
/// Overrides the location of the user secret store.
pub const SECRETS_FILE_VAR: &str = "BROWSERPILOT_SECRETS_FILE";

const DEFAULT_ENVIRONMENT: &str = "Production";
const APP_DIR_NAME: &str = "browserpilot";

/// Layered key/value configuration.
///
/// Keys are colon separated (`OpenAI:ApiKey`) and compared case-insensitively.
/// Merging a layer overwrites any key it defines; keys it does not define keep
/// the value of the earlier layers.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    // lowercased key -> (key as last written, value)
    values: BTreeMap<String, (String, String)>,
}

/// Where [`Settings::load_from`] looks for each layer.
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub base_dir: PathBuf,
    pub environment: String,
    pub secrets_file: Option<PathBuf>,
    pub dotenv_file: Option<PathBuf>,
    pub env_vars: Vec<(String, String)>,
}

impl ConfigSources {
    /// Sources for a normal process run: working directory files, the per-user
    /// secret store and the process environment.
    pub fn from_process() -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let environment = std::env::var(ENVIRONMENT_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let secrets_file = std::env::var(SECRETS_FILE_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("secrets.json")));

        Self {
            dotenv_file: Some(base_dir.join(".env")),
            base_dir,
            environment,
            secrets_file,
            env_vars: utf8_env_vars(std::env::vars_os()),
        }
    }
}

/// Keep the variables whose name and value are both valid UTF-8.
pub(crate) fn utf8_env_vars<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (name, _) => {
                log::debug!("Skipping non UTF-8 environment variable {:?}", name);
                None
            }
        })
        .collect()
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings holding only the compiled-in defaults.
    pub fn from_embedded_defaults() -> HarnessResult<Self> {
        let mut settings = Self::new();
        settings.merge_toml_str(include_str!("../Config.toml"), "embedded Config.toml")?;
        Ok(settings)
    }

    /// Load configuration with layered strategy:
    /// 1. Defaults (Embedded Config.toml)
    /// 2. ./appsettings.json
    /// 3. ./appsettings.{Environment}.json
    /// 4. User secrets (<config dir>/browserpilot/secrets.json)
    /// 5. ./.env
    /// 6. Environment variables
    pub fn load() -> HarnessResult<Self> {
        Self::load_from(&ConfigSources::from_process())
    }

    pub fn load_from(sources: &ConfigSources) -> HarnessResult<Self> {
        let mut settings = Self::from_embedded_defaults()?;

        settings.merge_json_file(sources.base_dir.join("appsettings.json"))?;
        settings.merge_json_file(
            sources
                .base_dir
                .join(format!("appsettings.{}.json", sources.environment)),
        )?;
        if let Some(secrets) = &sources.secrets_file {
            settings.merge_json_file(secrets)?;
        }
        if let Some(dotenv) = &sources.dotenv_file {
            settings.merge_dotenv_file(dotenv)?;
        }
        settings.merge_env(sources.env_vars.iter().cloned());

        Ok(settings)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .insert(key.to_lowercase(), (key.to_string(), value.into()));
    }

    /// Value with surrounding whitespace removed, `None` when missing or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_raw(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .map(|(_, v)| v.as_str())
    }

    /// Drop `key` and everything below it, so a list from a later layer
    /// replaces the earlier list instead of merging index by index.
    fn remove_section(&mut self, key: &str) {
        let lower = key.to_lowercase();
        let needle = format!("{}:", lower);
        self.values
            .retain(|k, _| k != &lower && !k.starts_with(&needle));
    }

    /// Direct children of `prefix`, keyed by the child segment as written.
    pub fn get_section(&self, prefix: &str) -> HashMap<String, String> {
        let needle = format!("{}:", prefix.to_lowercase());
        let mut out = HashMap::new();
        for (lower, (original, value)) in &self.values {
            if !lower.starts_with(&needle) {
                continue;
            }
            let Some(child) = original.get(needle.len()..) else {
                continue;
            };
            if child.is_empty() || child.contains(':') {
                continue;
            }
            out.insert(child.to_string(), value.clone());
        }
        out
    }

    /// A list value: the scalar value split on whitespace when set, otherwise
    /// the indexed children (`Key:0`, `Key:1`, ...).
    pub fn get_list(&self, key: &str) -> Vec<String> {
        if let Some(scalar) = self.get(key) {
            return scalar.split_whitespace().map(str::to_string).collect();
        }

        let mut indexed: Vec<(usize, String)> = self
            .get_section(key)
            .into_iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    pub fn get_u64(&self, key: &str) -> HarnessResult<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| {
                HarnessError::Configuration(format!("{} must be a non-negative integer, got '{}'", key, raw))
            }),
        }
    }

    pub fn merge_json_str(&mut self, content: &str, origin: &str) -> HarnessResult<()> {
        let value: Value = serde_json::from_str(content).map_err(|e| {
            HarnessError::Configuration(format!("Failed to parse {}: {}", origin, e))
        })?;
        if !value.is_object() {
            return Err(HarnessError::Configuration(format!(
                "{} must contain a JSON object at the top level",
                origin
            )));
        }
        flatten_json(self, "", &value);
        Ok(())
    }

    /// Merge a JSON file if it exists. Missing files are skipped.
    pub fn merge_json_file<P: AsRef<Path>>(&mut self, path: P) -> HarnessResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("Configuration file not found, skipping: {}", path.display());
            return Ok(());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            HarnessError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        self.merge_json_str(&content, &path.display().to_string())?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(())
    }

    pub fn merge_toml_str(&mut self, content: &str, origin: &str) -> HarnessResult<()> {
        let value: toml::Value = toml::from_str(content).map_err(|e| {
            HarnessError::Configuration(format!("Failed to parse {}: {}", origin, e))
        })?;
        flatten_toml(self, "", &value);
        Ok(())
    }

    /// Merge a `.env` file without touching the process environment.
    pub fn merge_dotenv_file<P: AsRef<Path>>(&mut self, path: P) -> HarnessResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            HarnessError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut vars = Vec::new();
        for item in iter {
            let pair = item.map_err(|e| {
                HarnessError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            vars.push(pair);
        }
        self.merge_env(vars);
        log::debug!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Merge environment-style variables; `__` separates sections.
    pub fn merge_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if name.is_empty() {
                continue;
            }
            self.set(&name.replace("__", ":"), value);
        }
    }
}

fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}:{}", prefix, segment)
    }
}

fn flatten_json(settings: &mut Settings, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_json(settings, &join_key(prefix, k), v);
            }
        }
        Value::Array(items) => {
            settings.remove_section(prefix);
            for (i, v) in items.iter().enumerate() {
                flatten_json(settings, &join_key(prefix, &i.to_string()), v);
            }
        }
        Value::String(s) => settings.set(prefix, s.clone()),
        Value::Null => settings.set(prefix, ""),
        other => settings.set(prefix, other.to_string()),
    }
}

fn flatten_toml(settings: &mut Settings, prefix: &str, value: &toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (k, v) in table {
                flatten_toml(settings, &join_key(prefix, k), v);
            }
        }
        toml::Value::Array(items) => {
            settings.remove_section(prefix);
            for (i, v) in items.iter().enumerate() {
                flatten_toml(settings, &join_key(prefix, &i.to_string()), v);
            }
        }
        toml::Value::String(s) => settings.set(prefix, s.clone()),
        other => settings.set(prefix, other.to_string()),
    }
}

/// Credential wrapper that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

/// Validated provider selection. One variant per provider; each carries what
/// the client factory needs to build the OpenAI-compatible client.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSettings {
    OpenAi {
        api_key: ApiKey,
        model_id: String,
        endpoint: String,
    },
    AzureOpenAi {
        endpoint: String,
        api_key: ApiKey,
        deployment_name: String,
        api_version: String,
    },
    Ollama {
        endpoint: String,
        model_name: String,
    },
}

impl ProviderSettings {
    pub fn provider(&self) -> LLMProvider {
        match self {
            Self::OpenAi { .. } => LLMProvider::OpenAI,
            Self::AzureOpenAi { .. } => LLMProvider::AzureOpenAI,
            Self::Ollama { .. } => LLMProvider::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi { model_id, .. } => model_id,
            Self::AzureOpenAi { deployment_name, .. } => deployment_name,
            Self::Ollama { model_name, .. } => model_name,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::OpenAi { endpoint, .. } => endpoint,
            Self::AzureOpenAi { endpoint, .. } => endpoint,
            Self::Ollama { endpoint, .. } => endpoint,
        }
    }

    /// Resolve `LLM:Provider` and the selected provider's fields.
    ///
    /// When `LLM:Provider` is not set, OpenAI is used if `OpenAI:ApiKey` is
    /// present and Azure OpenAI otherwise.
    pub fn resolve(settings: &Settings) -> HarnessResult<Self> {
        let provider = match settings.get("LLM:Provider") {
            Some(name) => LLMProvider::from_name(name).ok_or_else(|| {
                HarnessError::Configuration(format!(
                    "Unsupported LLM:Provider '{}'. Supported providers: {}",
                    name,
                    LLMProvider::supported_names()
                ))
            })?,
            None if settings.get("OpenAI:ApiKey").is_some() => LLMProvider::OpenAI,
            None => LLMProvider::AzureOpenAI,
        };

        match provider {
            LLMProvider::OpenAI => {
                let [api_key, model_id, endpoint] =
                    require(settings, ["OpenAI:ApiKey", "OpenAI:ChatModelId", "OpenAI:Endpoint"])?;
                Ok(Self::OpenAi {
                    api_key: ApiKey::new(api_key),
                    model_id,
                    endpoint: validate_endpoint("OpenAI:Endpoint", endpoint)?,
                })
            }
            LLMProvider::AzureOpenAI => {
                let [endpoint, api_key, deployment_name, api_version] = require(
                    settings,
                    [
                        "AzureOpenAI:Endpoint",
                        "AzureOpenAI:ApiKey",
                        "AzureOpenAI:DeploymentName",
                        "AzureOpenAI:ApiVersion",
                    ],
                )?;
                Ok(Self::AzureOpenAi {
                    endpoint: validate_endpoint("AzureOpenAI:Endpoint", endpoint)?,
                    api_key: ApiKey::new(api_key),
                    deployment_name,
                    api_version,
                })
            }
            LLMProvider::Ollama => {
                let [endpoint, model_name] = require(settings, ["Ollama:Endpoint", "Ollama:ModelName"])?;
                Ok(Self::Ollama {
                    endpoint: validate_endpoint("Ollama:Endpoint", endpoint)?,
                    model_name,
                })
            }
        }
    }
}

/// Fetch every key or fail listing all of the missing ones at once.
fn require<const N: usize>(settings: &Settings, keys: [&str; N]) -> HarnessResult<[String; N]> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| settings.get(k).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(HarnessError::Configuration(format!(
            "{} must be set in configuration",
            missing.join(" and ")
        )));
    }
    Ok(keys.map(|k| settings.get(k).unwrap_or_default().to_string()))
}

fn validate_endpoint(key: &str, raw: String) -> HarnessResult<String> {
    let parsed = url::Url::parse(&raw)
        .map_err(|e| HarnessError::Configuration(format!("{} is not a valid URL ('{}'): {}", key, raw, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(HarnessError::Configuration(format!(
            "{} must use http or https, got '{}'",
            key, raw
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// MCP server launch / connection specification
#[derive(Debug, Clone, PartialEq)]
pub enum McpServerConfig {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        inherit_stderr: bool,
    },
    StreamableHttp {
        mcp_url: String,
        headers: HashMap<String, String>,
    },
}

impl McpServerConfig {
    pub fn resolve(settings: &Settings) -> HarnessResult<Self> {
        let transport = settings.get("Mcp:Transport").unwrap_or("stdio");
        match transport.to_lowercase().as_str() {
            "stdio" => {
                let command = settings.get("Mcp:Command").ok_or_else(|| {
                    HarnessError::Configuration("Mcp:Command must be set for the stdio transport".to_string())
                })?;
                let inherit_stderr = match settings.get("Mcp:Stderr") {
                    None => false,
                    Some(v) if v.eq_ignore_ascii_case("inherit") => true,
                    Some(v) if v.eq_ignore_ascii_case("null") => false,
                    Some(v) => {
                        return Err(HarnessError::Configuration(format!(
                            "Mcp:Stderr must be 'inherit' or 'null', got '{}'",
                            v
                        )))
                    }
                };
                Ok(Self::Stdio {
                    command: command.to_string(),
                    args: settings.get_list("Mcp:Args"),
                    env: settings.get_section("Mcp:Env"),
                    inherit_stderr,
                })
            }
            "streamablehttp" | "http" => {
                let url = settings.get("Mcp:Url").ok_or_else(|| {
                    HarnessError::Configuration("Mcp:Url must be set for the streamableHttp transport".to_string())
                })?;
                Ok(Self::StreamableHttp {
                    mcp_url: validate_endpoint("Mcp:Url", url.to_string())?,
                    headers: settings.get_section("Mcp:Headers"),
                })
            }
            other => Err(HarnessError::Configuration(format!(
                "Unsupported Mcp:Transport '{}'. Supported transports: stdio, streamableHttp",
                other
            ))),
        }
    }

    /// Short human readable form for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Stdio { command, args, .. } => format!("stdio: {} {}", command, args.join(" ")),
            Self::StreamableHttp { mcp_url, .. } => format!("streamableHttp: {}", mcp_url),
        }
    }

    /// Build the client. No process is spawned and no connection is made
    /// until the first request.
    pub fn create_client(&self) -> McpClient {
        match self {
            Self::Stdio {
                command,
                args,
                env,
                inherit_stderr,
            } => McpClient::new_stdio(command.clone(), args.clone(), env.clone(), *inherit_stderr),
            Self::StreamableHttp { mcp_url, headers } => {
                McpClient::new_streamable_http(mcp_url.clone(), headers.clone())
            }
        }
    }
}

/// Settings for the single prompt pass
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationConfig {
    /// Namespace the discovered tools are registered under
    pub plugin_name: String,
    pub prompt: String,
    /// Model round trips that may still offer tools before it must answer
    pub max_auto_invoke_attempts: usize,
}

impl OrchestrationConfig {
    pub fn resolve(settings: &Settings) -> HarnessResult<Self> {
        let [plugin_name, prompt] = require(settings, ["Orchestration:PluginName", "Orchestration:Prompt"])?;
        if !plugin_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(HarnessError::Configuration(format!(
                "Orchestration:PluginName may only contain ASCII letters, digits and '_', got '{}'",
                plugin_name
            )));
        }
        let max_auto_invoke_attempts = settings
            .get_u64("Orchestration:MaxAutoInvokeAttempts")?
            .unwrap_or(40) as usize;

        Ok(Self {
            plugin_name,
            prompt,
            max_auto_invoke_attempts,
        })
    }
}

/// Everything the host needs, resolved and validated up front.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub provider: ProviderSettings,
    pub request_timeout: Duration,
    pub mcp_server: McpServerConfig,
    pub orchestration: OrchestrationConfig,
    pub log_level: LevelFilter,
}

impl AppConfig {
    pub fn load() -> HarnessResult<Self> {
        Self::from_settings(Settings::load()?)
    }

    pub fn from_settings(settings: Settings) -> HarnessResult<Self> {
        let provider = ProviderSettings::resolve(&settings)?;
        let timeout_secs = settings.get_u64("LLM:TimeoutSeconds")?.unwrap_or(300);
        let mcp_server = McpServerConfig::resolve(&settings)?;
        let orchestration = OrchestrationConfig::resolve(&settings)?;
        let log_level = match settings.get("Logging:LogLevel:Default") {
            None => LevelFilter::Info,
            Some(raw) => parse_log_level(raw).ok_or_else(|| {
                HarnessError::Configuration(format!("Logging:LogLevel:Default has unknown level '{}'", raw))
            })?,
        };

        Ok(Self {
            settings,
            provider,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            mcp_server,
            orchestration,
            log_level,
        })
    }
}

/// Accepts both the `Information`/`Critical` style names and Rust's level names.
pub fn parse_log_level(raw: &str) -> Option<LevelFilter> {
    match raw.trim().to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "information" | "info" => Some(LevelFilter::Info),
        "warning" | "warn" => Some(LevelFilter::Warn),
        "error" | "critical" => Some(LevelFilter::Error),
        "none" | "off" => Some(LevelFilter::Off),
        _ => None,
    }
}
