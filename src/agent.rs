pub mod llm;
pub mod r#loop;
pub mod tool;
pub mod types;
