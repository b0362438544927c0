use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("no area selected")]
    InvalidSelection,
    #[error("{0}")]
    DetectionFailed(String),
    #[error("detection timed out after {0} ms")]
    NetworkTimeout(u64),
    #[error("detection cancelled")]
    Cancelled,
    #[error("detection superseded by a newer request")]
    Superseded,
}

impl DetectionError {
    /// Notice shown to the user, or `None` when the error should pass silently.
    ///
    /// Timeouts read the same as any other failed detection.
    pub fn user_message(&self) -> Option<String> {
        match self {
            DetectionError::InvalidSelection => Some("Select an area first.".to_string()),
            DetectionError::DetectionFailed(message) => Some(message.clone()),
            DetectionError::NetworkTimeout(_) => {
                Some("Detection failed: the service did not respond in time.".to_string())
            }
            DetectionError::Cancelled | DetectionError::Superseded => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DetectionError::DetectionFailed(_) | DetectionError::NetworkTimeout(_)
        )
    }
}
