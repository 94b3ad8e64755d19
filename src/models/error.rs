use derive_more::Display;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum SError {
    #[display("You cannot install two packages at once!")]
    Busy,
    #[display("Failed to acquire package: {_0}")]
    Acquisition(String),
    #[display("Failed to launch game: {_0}")]
    Launch(String),
    #[display("Failed to link package content: {_0}")]
    Link(String),
    #[display("Sandbox violation: {_0}")]
    SandboxViolation(String),
    #[display("Invalid handle: {_0}")]
    InvalidHandle(String),
    #[display("Script error: {_0}")]
    Script(String),
    #[display("Timed out: {_0}")]
    Timeout(String),
    #[display("Installation cancelled")]
    Cancelled,
    #[display("{_0}")]
    ParseError(String),
    #[display("{_0}")]
    IOError(String),
    #[display("Unexpected error{}", _0.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unexpected(Option<String>),
}

impl std::error::Error for SError {}

impl From<std::io::Error> for SError {
    fn from(e: std::io::Error) -> Self {
        SError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for SError {
    fn from(e: serde_json::Error) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<toml::de::Error> for SError {
    fn from(e: toml::de::Error) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<toml::ser::Error> for SError {
    fn from(e: toml::ser::Error) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<confy::ConfyError> for SError {
    fn from(e: confy::ConfyError) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<camino::FromPathBufError> for SError {
    fn from(e: camino::FromPathBufError) -> Self {
        SError::ParseError(format!("Invalid UTF-8 path: {}", e.as_path().display()))
    }
}

impl From<std::path::StripPrefixError> for SError {
    fn from(e: std::path::StripPrefixError) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<mlua::Error> for SError {
    fn from(e: mlua::Error) -> Self {
        SError::Script(e.to_string())
    }
}

impl From<ureq::Error> for SError {
    fn from(e: ureq::Error) -> Self {
        SError::Acquisition(e.to_string())
    }
}

impl From<tungstenite::Error> for SError {
    fn from(e: tungstenite::Error) -> Self {
        SError::IOError(e.to_string())
    }
}
