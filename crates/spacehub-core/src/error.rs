// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for spacehub-core.
//!
//! One error type covers the orchestrator, the SpaceApp state machine and the
//! inference lease manager. Collaborator implementations report their own
//! failures through the opaque variants (`Ledger`, `Repo`, `Store`, ...).

use thiserror::Error;

use crate::app::SpaceAppStatus;
use crate::space::ComputeType;

/// Result type using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The quota ledger refused a `Consume`.
    #[error(
        "Quota exhausted for user '{user}' on {compute_type}: requested {requested}, available {available}"
    )]
    QuotaExhausted {
        /// Owner of the ledger row.
        user: String,
        /// Hardware class of the ledger row.
        compute_type: ComputeType,
        /// Units requested.
        requested: u32,
        /// Units still free.
        available: u32,
    },

    /// The backing repository could not be created.
    #[error("Repository provisioning failed for '{name}': {reason}")]
    RepoProvisionFailed {
        /// Requested repository name.
        name: String,
        /// Provider error text.
        reason: String,
    },

    /// The Space record could not be saved.
    #[error("Failed to persist space '{name}': {reason}")]
    SpacePersistFailed {
        /// Space name.
        name: String,
        /// Store error text.
        reason: String,
    },

    /// Binding the quota reservation to the new Space failed; the creation
    /// was rolled back.
    #[error("Quota binding failed for space '{space_id}': {reason}")]
    QuotaBindingFailed {
        /// Id of the Space that was rolled back.
        space_id: String,
        /// Ledger error text.
        reason: String,
    },

    /// A saga step failed and at least one compensation failed as well.
    /// Needs operator intervention.
    #[error(
        "Compensation failed after step '{step}' failed ({cause}); compensation errors: {}",
        .failures.join("; ")
    )]
    CompensationFailed {
        /// The saga step whose failure triggered compensation.
        step: &'static str,
        /// Root cause text of the step failure.
        cause: String,
        /// One entry per failed compensation, `"<step>: <error>"`.
        failures: Vec<String>,
    },

    /// Illegal SpaceApp transition.
    #[error("Unmatched app status: cannot apply '{transition}' while {status}")]
    UnmatchedAppStatus {
        /// Attempted transition.
        transition: &'static str,
        /// Status at the time of the attempt.
        status: SpaceAppStatus,
    },

    /// The boot file is missing from the Space repository.
    #[error("Unavailable repo file: '{file}' not found in '{dir}' of repo owned by '{user}'")]
    UnavailableRepoFile {
        /// Repository owner.
        user: String,
        /// Directory searched.
        dir: String,
        /// File name searched.
        file: String,
    },

    /// Another caller inserted an inference instance for the same key first.
    #[error("Duplicate inference creation for space '{space_id}' at '{last_commit}'")]
    DuplicateInstanceCreation {
        /// Space id.
        space_id: String,
        /// Boot file content hash.
        last_commit: String,
    },

    /// Compare-and-set write lost against a concurrent writer.
    #[error("Stale {entity} '{id}': expected version {expected}, found {actual}")]
    StaleOptimisticVersion {
        /// Entity kind ("space_app", "inference").
        entity: &'static str,
        /// Entity key.
        id: String,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// An inference instance for this key failed permanently.
    #[error("Inference instance '{instance_id}' failed: {error}")]
    DeadInference {
        /// Failed instance id.
        instance_id: String,
        /// Stored error text.
        error: String,
    },

    /// Space record was not found.
    #[error("Space not found: {0}")]
    SpaceNotFound(String),

    /// SpaceApp was not found.
    #[error("Space app not found: {0}")]
    SpaceAppNotFound(String),

    /// Inference instance was not found.
    #[error("Inference instance not found: {0}")]
    InferenceNotFound(String),

    /// Quota ledger failure.
    #[error("Quota ledger error: {0}")]
    Ledger(String),

    /// Repository provider failure.
    #[error("Repository provider error: {0}")]
    Repo(String),

    /// Store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Event publication failure.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Compute manager failure.
    #[error("Compute manager error: {0}")]
    Compute(String),

    /// Activity log failure.
    #[error("Activity log error: {0}")]
    Activity(String),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::QuotaExhausted { .. } => "QUOTA_EXHAUSTED",
            Self::RepoProvisionFailed { .. } => "REPO_PROVISION_FAILED",
            Self::SpacePersistFailed { .. } => "SPACE_PERSIST_FAILED",
            Self::QuotaBindingFailed { .. } => "QUOTA_BINDING_FAILED",
            Self::CompensationFailed { .. } => "COMPENSATION_FAILED",
            Self::UnmatchedAppStatus { .. } => "UNMATCHED_APP_STATUS",
            Self::UnavailableRepoFile { .. } => "UNAVAILABLE_REPO_FILE",
            Self::DuplicateInstanceCreation { .. } => "DUPLICATE_INSTANCE_CREATION",
            Self::StaleOptimisticVersion { .. } => "STALE_OPTIMISTIC_VERSION",
            Self::DeadInference { .. } => "DEAD_INFERENCE",
            Self::SpaceNotFound(_) => "SPACE_NOT_FOUND",
            Self::SpaceAppNotFound(_) => "SPACE_APP_NOT_FOUND",
            Self::InferenceNotFound(_) => "INFERENCE_NOT_FOUND",
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::Repo(_) => "REPO_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Publish(_) => "PUBLISH_ERROR",
            Self::Compute(_) => "COMPUTE_ERROR",
            Self::Activity(_) => "ACTIVITY_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// True for conflicts the caller resolves by re-reading.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateInstanceCreation { .. } | Self::StaleOptimisticVersion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let test_cases = vec![
            (
                Error::QuotaExhausted {
                    user: "alice".to_string(),
                    compute_type: ComputeType::Npu,
                    requested: 1,
                    available: 0,
                },
                "QUOTA_EXHAUSTED",
            ),
            (
                Error::UnmatchedAppStatus {
                    transition: "serving_confirmed",
                    status: SpaceAppStatus::Init,
                },
                "UNMATCHED_APP_STATUS",
            ),
            (
                Error::CompensationFailed {
                    step: "bind-quota",
                    cause: "ledger down".to_string(),
                    failures: vec!["create-repo: timeout".to_string()],
                },
                "COMPENSATION_FAILED",
            ),
            (
                Error::DuplicateInstanceCreation {
                    space_id: "s1".to_string(),
                    last_commit: "abc".to_string(),
                },
                "DUPLICATE_INSTANCE_CREATION",
            ),
        ];

        for (error, expected_code) in test_cases {
            assert_eq!(
                error.error_code(),
                expected_code,
                "Error {:?} should have code {}",
                error,
                expected_code
            );
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_unmatched_status_display_names_pair() {
        let err = Error::UnmatchedAppStatus {
            transition: "serving_confirmed",
            status: SpaceAppStatus::Init,
        };
        assert_eq!(
            err.to_string(),
            "Unmatched app status: cannot apply 'serving_confirmed' while init"
        );
    }

    #[test]
    fn test_compensation_failed_display_lists_failures() {
        let err = Error::CompensationFailed {
            step: "bind-quota",
            cause: "ledger down".to_string(),
            failures: vec![
                "save-space: store offline".to_string(),
                "create-repo: 503".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("bind-quota"));
        assert!(msg.contains("ledger down"));
        assert!(msg.contains("save-space: store offline; create-repo: 503"));
    }

    #[test]
    fn test_is_conflict() {
        assert!(
            Error::StaleOptimisticVersion {
                entity: "space_app",
                id: "x".to_string(),
                expected: 1,
                actual: 2,
            }
            .is_conflict()
        );
        assert!(!Error::SpaceNotFound("x".to_string()).is_conflict());
    }
}
