use crate::validation::Violation;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use sled::transaction::TransactionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<Violation>),
    #[error("user with id {0} not found")]
    UserNotFound(u64),
    #[error("film with id {0} not found")]
    FilmNotFound(u64),
    #[error("genre with id {0} not found")]
    GenreNotFound(u32),
    #[error("rating with id {0} not found")]
    MpaNotFound(u32),
    #[error("user {user_id} already liked film {film_id}")]
    AlreadyLiked { film_id: u64, user_id: u64 },
    #[error("user {0} cannot befriend themselves")]
    SelfFriendship(u64),
    #[error("no free id left")]
    IdsExhausted,
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<TransactionError<Error>> for Error {
    fn from(err: TransactionError<Error>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => Error::Storage(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<&'a [Violation]>,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::SelfFriendship(_) => StatusCode::BAD_REQUEST,
            Error::UserNotFound(_)
            | Error::FilmNotFound(_)
            | Error::GenreNotFound(_)
            | Error::MpaNotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyLiked { .. } | Error::IdsExhausted => StatusCode::CONFLICT,
            Error::Storage(_) | Error::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Error::Storage(_) | Error::Codec(_) => {
                error!("{:?}", self);
                ErrorBody {
                    error: "Database error".to_owned(),
                    violations: None,
                }
            }
            Error::Validation(violations) => ErrorBody {
                error: self.to_string(),
                violations: Some(violations.as_slice()),
            },
            _ => ErrorBody {
                error: self.to_string(),
                violations: None,
            },
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Error::UserNotFound(1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::FilmNotFound(1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::AlreadyLiked {
                film_id: 1,
                user_id: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Validation(Vec::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::IdsExhausted.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_messages_name_the_entity() {
        assert_eq!(Error::UserNotFound(9999).to_string(), "user with id 9999 not found");
        assert_eq!(Error::FilmNotFound(7).to_string(), "film with id 7 not found");
    }

    #[test]
    fn abort_unwraps_to_inner_error() {
        let err: Error = TransactionError::Abort(Error::UserNotFound(3)).into();
        assert!(matches!(err, Error::UserNotFound(3)));
    }
}
