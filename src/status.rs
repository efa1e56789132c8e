//! Mapping of directory processing state onto HTTP status codes

use crate::model::ProcessingStatus;
use http::StatusCode;

/// The collection operations exposed by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Choose the success status for an operation.
///
/// Deletion is always reported as accepted, even when the directory finished
/// synchronously.
pub fn success_status(operation: Operation, status: ProcessingStatus) -> StatusCode {
    match operation {
        Operation::Get | Operation::List => StatusCode::OK,
        Operation::Create if status.is_pending() => StatusCode::ACCEPTED,
        Operation::Create => StatusCode::CREATED,
        Operation::Update if status.is_pending() => StatusCode::ACCEPTED,
        Operation::Update => StatusCode::OK,
        Operation::Delete => StatusCode::ACCEPTED,
    }
}
