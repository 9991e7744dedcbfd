use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unexpected argument '{arg}' encountered in position {pos}")]
    InvalidArgument { arg: String, pos: usize },

    #[error("The argument '{0}' expects a parameter but none was specified")]
    MissingArgumentParameter(String),

    #[error("The command 'exec' expects a program to run but none was specified")]
    EmptyCommand,

    #[error("Unexpected argument '{0}'")]
    UnexpectedFilterArgument(String),

    #[error("The filter '{0}' expects a parameter but none was specified")]
    MissingFilterParameter(String),

    #[error("Invalid regular expression '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Expected single sign-on profile '{profile}' but the field '{field}' is missing")]
    InvalidSsoProfile { profile: String, field: String },

    #[error("The config profile ({0}) could not be found")]
    ProfileNotFound(String),

    #[error("Error when retrieving token from sso: {0}")]
    TokenRetrieval(String),

    #[error("Unable to locate the home directory, neither HOME nor USERPROFILE is set")]
    HomeNotFound,

    #[error("SSO request failed: {0}")]
    Sso(String),

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InvalidSsoProfile { .. }
            | Error::ProfileNotFound(_)
            | Error::TokenRetrieval(_)
            | Error::HomeNotFound => 2,
            _ => 1,
        }
    }

    /// Whether the usage line should follow the error message.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument { .. }
                | Error::MissingArgumentParameter(_)
                | Error::EmptyCommand
        )
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::InvalidSsoProfile { .. } => {
                Some("Hint: did you forget to specify the '--profile' argument?")
            }
            Error::ProfileNotFound(_) => Some("Hint: typo in the parameter to '--profile'?"),
            Error::TokenRetrieval(_) => {
                Some("Hint: try logging in again with 'aws --profile PROFILE sso login'")
            }
            _ => None,
        }
    }
}

/// Flattens an error and its sources into a single line.
pub fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // smithy errors often repeat their source in their own message
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
