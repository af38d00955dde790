// Chat message types and the OpenAI-compatible client

pub mod provider_handle;
pub mod provider_base;

pub mod openai;
