use thiserror::Error;

use crate::models::ApplicationStatus;

/// Failures surfaced to whoever invoked an operation. Every variant is
/// recoverable by fixing the input or retrying.
#[derive(Debug, Error)]
pub enum AdmitError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("College #{0} not found")]
    UnknownCollege(u32),

    #[error("{college} is not accepting applications")]
    AdmissionClosed { college: String },

    #[error("'{subject}' is not a program offered by {college}")]
    UnknownProgram { subject: String, college: String },

    #[error("Application #{0} not found")]
    UnknownApplication(i64),

    #[error("Application #{id} is {status}; only accepted applications can be reviewed")]
    NotAccepted { id: i64, status: ApplicationStatus },

    #[error("Submission failed, please try again: {0}")]
    Submission(#[source] anyhow::Error),

    #[error("Sign-in failed: {0}")]
    Authentication(String),

    #[error("Not signed in. Run 'admit login' first.")]
    NotSignedIn,
}

impl AdmitError {
    /// Validation errors mean the operation was never attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AdmitError::MissingField(_)
                | AdmitError::RatingOutOfRange(_)
                | AdmitError::InvalidEmail(_)
                | AdmitError::UnknownCollege(_)
                | AdmitError::AdmissionClosed { .. }
                | AdmitError::UnknownProgram { .. }
        )
    }
}

pub type AdmitResult<T> = std::result::Result<T, AdmitError>;
