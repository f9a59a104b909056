pub mod data;
pub mod llm;
pub mod pipeline;
pub mod viz;
