use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use rocket::{http::Status, response::Responder, Request};
use thiserror::Error;

use crate::contract::VotingError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Voting(#[from] VotingError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Voting(err) => match err {
                VotingError::Unauthorized { .. } => Status::Forbidden,
                VotingError::NotFound(_) => Status::NotFound,
                VotingError::DuplicateUser(_)
                | VotingError::AlreadyVoted { .. }
                | VotingError::ElectionNotOpen { .. }
                | VotingError::InvalidStateTransition { .. } => Status::Conflict,
                VotingError::InvalidRole(_)
                | VotingError::InvalidOptions(_)
                | VotingError::InvalidChoice { .. } => Status::UnprocessableEntity,
                VotingError::Journal(_) => Status::InternalServerError,
            },
            // Tokens are only ever decoded to identify a caller, so any
            // failure means the caller could not be authenticated.
            Self::Jwt(_) => Status::Unauthorized,
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        (status, self.to_string()).respond_to(req)
    }
}
