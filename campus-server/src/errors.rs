use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use campus_registry::{CatalogError, DatabaseError, DirectoryError, PrimaryKey, RosterError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredential,
    #[error("{0}")]
    Forbidden(String),
    #[error("Class {class_id} is full, all {capacity} seats are taken")]
    CapacityExceeded {
        class_id: PrimaryKey,
        capacity: i64,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidCredential => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DirectoryError> for ServerError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::InvalidCredential => Self::InvalidCredential,
            DirectoryError::WrongRole { .. } => Self::Forbidden(value.to_string()),
            DirectoryError::RecoveryTokenInvalid => Self::Validation(value.to_string()),
            DirectoryError::MissingField(_) => Self::Validation(value.to_string()),
            DirectoryError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotATeacher { .. } => Self::Forbidden(value.to_string()),
            CatalogError::InvalidCapacity => Self::Validation(value.to_string()),
            CatalogError::MissingField(_) => Self::Validation(value.to_string()),
            CatalogError::Db(e) => e.into(),
        }
    }
}

impl From<RosterError> for ServerError {
    fn from(value: RosterError) -> Self {
        match value {
            RosterError::CapacityExceeded { class_id, capacity } => {
                Self::CapacityExceeded { class_id, capacity }
            }
            RosterError::InvalidGrade { .. } => Self::Validation(value.to_string()),
            RosterError::Forbidden => Self::Forbidden(value.to_string()),
            RosterError::NotAStudent { .. } => Self::Forbidden(value.to_string()),
            RosterError::Db(e) => e.into(),
        }
    }
}
