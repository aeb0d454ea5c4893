//! AWS SDK error handling

use crate::error::ApiError;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Convert any SDK operation error into an [`ApiError`], keeping the AWS code
pub fn from_sdk<E, R>(operation: &'static str, err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let code = err.code().map(str::to_string);
    let message = match err.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    tracing::debug!("{} failed: code={:?} message={}", operation, code, message);
    ApiError {
        operation,
        code,
        message,
    }
}

/// Request builder validation failure (a required field was not set)
pub fn from_build(operation: &'static str, err: aws_sdk_ecs::error::BuildError) -> ApiError {
    ApiError::new(operation, Some("BuildError"), err.to_string())
}

/// Add a hint for common AWS error codes
pub fn format_aws_error(error: &anyhow::Error) -> String {
    let Some(api) = error.downcast_ref::<ApiError>() else {
        return format!("{:#}", error);
    };

    let hint = match api.code.as_deref() {
        Some("AccessDeniedException" | "AccessDenied" | "UnauthorizedOperation") => {
            Some("Permission denied. Check the IAM permissions of your AWS credentials.")
        }
        Some("ExpiredTokenException" | "ExpiredToken") => {
            Some("AWS credentials have expired. Refresh them and retry.")
        }
        Some("UnrecognizedClientException" | "InvalidClientTokenId") => {
            Some("AWS credentials are not valid for this region or account.")
        }
        Some("ClusterNotFoundException") => Some("Cluster not found. Declare it with a cluster document."),
        _ if api.is_rate_exceeded() => Some("Rate limit exceeded. Please try again later."),
        _ => None,
    };

    match hint {
        Some(hint) => format!("{:#} ({})", error, hint),
        None => format!("{:#}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_access_denied() {
        let err: anyhow::Error =
            ApiError::new("ListClusters", Some("AccessDeniedException"), "not allowed").into();
        let msg = format_aws_error(&err);
        assert!(msg.contains("ListClusters failed: not allowed"));
        assert!(msg.contains("IAM permissions"));
    }

    #[test]
    fn test_format_plain_error() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(format_aws_error(&err), "something else");
    }

    #[test]
    fn test_format_throttled() {
        let err: anyhow::Error =
            ApiError::new("UpdateService", Some("ThrottlingException"), "Rate exceeded").into();
        assert!(format_aws_error(&err).contains("Rate limit exceeded"));
    }
}
