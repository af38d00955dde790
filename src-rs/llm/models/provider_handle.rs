use std::time::Duration;

use crate::config::ProviderSettings;
use crate::error::HarnessResult;

use super::openai::{create_azure_openai, create_ollama, create_openai, OpenAiClient};
pub use super::provider_base::{ExecutionSettings, FunctionChoice, Message, ProviderClient};

/// Build the chat client for the selected provider. Performs no network I/O.
pub fn create_client(settings: &ProviderSettings, timeout: Duration) -> HarnessResult<OpenAiClient> {
    let client = match settings {
        ProviderSettings::OpenAi {
            api_key,
            model_id,
            endpoint,
        } => create_openai(endpoint, api_key.clone(), model_id.clone(), timeout)?,
        ProviderSettings::AzureOpenAi {
            endpoint,
            api_key,
            deployment_name,
            api_version,
        } => create_azure_openai(endpoint, api_key.clone(), deployment_name.clone(), api_version, timeout)?,
        ProviderSettings::Ollama { endpoint, model_name } => {
            create_ollama(endpoint, model_name.clone(), timeout)?
        }
    };

    log::info!(
        "Chat client ready: provider={}, model={}, endpoint={}",
        client.provider,
        client.model,
        settings.endpoint()
    );
    Ok(client)
}
