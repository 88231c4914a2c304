pub mod blob;
pub mod line;
pub mod llm;
