pub mod cors;
pub mod llm;
