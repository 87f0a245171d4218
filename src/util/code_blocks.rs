use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeBlocksError {
    #[error("Json not found in doc: {0}")]
    NotFound(String),

    #[error("Invalid json in doc: {blocks:?}")]
    InvalidJson {
        blocks: Vec<String>,
        #[source]
        source: serde_json::Error,
    },
}

/// Pull JSON documents out of a model answer.
///
/// The whole answer is tried first; otherwise every ```` ```json ```` fenced
/// block is collected and parsed.
pub fn find_json_blocks(doc: &str) -> Result<Vec<Value>, CodeBlocksError> {
    if let Ok(value) = serde_json::from_str(doc) {
        return Ok(vec![value]);
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut block_lines: Vec<&str> = Vec::new();
    let mut in_block = false;
    for line in doc.split('\n') {
        if in_block && line.contains("```") {
            in_block = false;
        } else if in_block {
            block_lines.push(line.trim());
        } else if line.contains("```json") {
            in_block = true;
            if !block_lines.is_empty() {
                blocks.push(block_lines.concat());
                block_lines.clear();
            }
        }
    }
    if !block_lines.is_empty() {
        blocks.push(block_lines.concat());
    }

    if blocks.is_empty() {
        return Err(CodeBlocksError::NotFound(doc.to_string()));
    }

    blocks
        .iter()
        .map(|b| serde_json::from_str(b))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CodeBlocksError::InvalidJson {
            blocks: blocks.clone(),
            source,
        })
}
