pub mod agent;

pub use agent::{Agent, AgentResult, ChatModel, ToolExecutionResult};
