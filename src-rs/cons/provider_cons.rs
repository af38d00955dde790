use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LLMProvider {
    OpenAI,
    AzureOpenAI,
    Ollama,
}

impl LLMProvider {
    pub const ALL: [LLMProvider; 3] = [LLMProvider::OpenAI, LLMProvider::AzureOpenAI, LLMProvider::Ollama];

    /// Returns the identifier used for `LLM:Provider` in configuration (e.g., "OpenAI", "Ollama")
    pub fn provider_name(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "OpenAI",
            LLMProvider::AzureOpenAI => "AzureOpenAI",
            LLMProvider::Ollama => "Ollama",
        }
    }

    /// Helper to parse from a string (handles aliases)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(LLMProvider::OpenAI),
            "azureopenai" | "azure_openai" | "azure-openai" | "azure" => Some(LLMProvider::AzureOpenAI),
            "ollama" => Some(LLMProvider::Ollama),
            _ => None,
        }
    }

    /// Comma separated list of accepted names, for error messages.
    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.provider_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// Ensure Display trait matches provider_name for convenience
impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.provider_name())
    }
}
