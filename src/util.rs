pub mod code_blocks;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Read every prompt file, trimming surrounding whitespace
pub fn read_prompts(paths: &[PathBuf]) -> Result<Vec<String>, ConfigError> {
    paths
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .map(|p| p.trim().to_string())
                .map_err(|source| ConfigError::PromptFile {
                    path: path.clone(),
                    source,
                })
        })
        .collect()
}

/// System prompts come either inline or from files, never both and never neither
pub fn ensure_prompts(
    system_prompts: Option<Vec<String>>,
    system_prompt_paths: Option<Vec<PathBuf>>,
) -> Result<Vec<String>, ConfigError> {
    match (system_prompts, system_prompt_paths) {
        (Some(prompts), None) => Ok(prompts),
        (None, Some(paths)) => read_prompts(&paths),
        (None, None) => Err(ConfigError::Prompts(
            "Either system_prompts or system_prompt_paths must be provided".into(),
        )),
        (Some(_), Some(_)) => Err(ConfigError::Prompts(
            "Only one of system_prompts or system_prompt_paths must be provided".into(),
        )),
    }
}
