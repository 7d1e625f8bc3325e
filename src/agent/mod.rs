pub mod ai_client;
pub mod classifier;
pub mod formatter;
pub mod orchestrator;
pub mod system_info;
pub mod types;

pub use orchestrator::AgentService;
pub use types::*;
