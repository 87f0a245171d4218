use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure a conversation or a routed request can end with
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Whether the sentinel route may retry this failure on the secondary provider
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Bad setup, raised at registration or construction time and never retried
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("field '{field}' of tool '{tool}' has no description")]
    MissingDescription { tool: String, field: String },

    #[error("field '{field}' of tool '{tool}' has no resolvable type")]
    MissingType { tool: String, field: String },

    #[error("argument of tool '{0}' must be a struct with named fields")]
    NotARecord(String),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("no operation named '{0}' among the tool candidates")]
    UnknownCandidate(String),

    #[error("model name must follow the '{0}' prefix")]
    EmptyModelName(String),

    #[error("routing table refers to unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("{0}")]
    Prompts(String),

    #[error("cannot read prompt file {path}: {source}")]
    PromptFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Network or provider failure
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("provider returned no choices")]
    NoChoices,

    #[error("{0}")]
    Other(String),
}

/// The remote side or the model broke the conversation contract
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("tool {0} is not implemented")]
    ToolNotFound(String),

    #[error("malformed arguments for tool '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("tool '{tool}' produced an unserializable result: {source}")]
    InvalidResult {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("call to tool '{0}' has an empty id")]
    EmptyCallId(String),

    #[error("transport returned an empty message list")]
    EmptyResponse,

    #[error("conversation exceeded {0} rounds")]
    TooManyRounds(usize),
}
