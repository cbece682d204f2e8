use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("This email is already registered")]
    DuplicateEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("character {0} not found")]
    CharacterNotFound(String),
    #[error("only the creator can change character {0}")]
    NotOwner(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("a reply is still pending")]
    Busy,
    #[error("nothing to send")]
    Empty,
    #[error("nothing to regenerate")]
    NothingToRegenerate,
    #[error("message {0} cannot be edited")]
    NotEditable(String),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}
