pub mod base;
pub mod research;
pub mod technical;

pub use base::{Agent, AgentResult};
pub use research::ResearchAgent;
pub use technical::TechnicalAgent;
