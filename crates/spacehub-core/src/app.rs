// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SpaceApp state machine.
//!
//! One [`SpaceApp`] tracks the build and serve progression of a Space at one
//! commit. Transitions are checked against the table below; an illegal
//! transition is rejected with [`Error::UnmatchedAppStatus`] and leaves the
//! entity untouched.
//!
//! | From | Transition | To |
//! |------|------------|----|
//! | `INIT`, `BUILD_FAILED` | `start_build` | `BUILDING` |
//! | `BUILDING` | `build_failed` | `BUILD_FAILED` |
//! | `BUILDING` | `build_succeeded` | `STARTING` |
//! | `STARTING` | `start_failed` | `START_FAILED` |
//! | `STARTING`, `RESTARTING`, `RESUMING` | `serving_confirmed` | `SERVING` |
//! | `SERVING`, `START_FAILED`, `RESTART_FAILED` | `restart` | `RESTARTING` |
//! | `RESTARTING` | `restart_failed` | `RESTART_FAILED` |
//! | `SERVING` | `pause` | `PAUSED` |
//! | `PAUSED`, `SLEEPING`, `RESUME_FAILED` | `resume` | `RESUMING` |
//! | `RESUMING` | `resume_failed` | `RESUME_FAILED` |
//! | `SERVING` | `sleep` | `SLEEPING` |
//!
//! Every failure state has a retry edge back into the pipeline; a rebuild
//! out of `BUILD_FAILED` clears the stored reason.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Key of one build/serve attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceAppIndex {
    /// Space id.
    pub space_id: String,
    /// VCS commit id.
    pub commit_id: String,
}

impl SpaceAppIndex {
    /// Create an index.
    pub fn new(space_id: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            commit_id: commit_id.into(),
        }
    }
}

impl fmt::Display for SpaceAppIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.space_id, self.commit_id)
    }
}

/// Status of a SpaceApp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceAppStatus {
    /// Commit observed, nothing started.
    Init,
    /// Image build in progress.
    Building,
    /// Image build failed.
    BuildFailed,
    /// Serving container starting.
    Starting,
    /// Serving container failed to start.
    StartFailed,
    /// Serving traffic.
    Serving,
    /// Restart in progress.
    Restarting,
    /// Restart failed.
    RestartFailed,
    /// Paused by the owner.
    Paused,
    /// Resume in progress.
    Resuming,
    /// Resume failed.
    ResumeFailed,
    /// Put to sleep after inactivity.
    Sleeping,
}

impl SpaceAppStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Building => "building",
            Self::BuildFailed => "build_failed",
            Self::Starting => "starting",
            Self::StartFailed => "start_failed",
            Self::Serving => "serving",
            Self::Restarting => "restarting",
            Self::RestartFailed => "restart_failed",
            Self::Paused => "paused",
            Self::Resuming => "resuming",
            Self::ResumeFailed => "resume_failed",
            Self::Sleeping => "sleeping",
        }
    }

    /// Parse a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let status = match s {
            "init" => Self::Init,
            "building" => Self::Building,
            "build_failed" => Self::BuildFailed,
            "starting" => Self::Starting,
            "start_failed" => Self::StartFailed,
            "serving" => Self::Serving,
            "restarting" => Self::Restarting,
            "restart_failed" => Self::RestartFailed,
            "paused" => Self::Paused,
            "resuming" => Self::Resuming,
            "resume_failed" => Self::ResumeFailed,
            "sleeping" => Self::Sleeping,
            _ => return None,
        };
        Some(status)
    }

    /// All statuses.
    pub const ALL: [SpaceAppStatus; 12] = [
        Self::Init,
        Self::Building,
        Self::BuildFailed,
        Self::Starting,
        Self::StartFailed,
        Self::Serving,
        Self::Restarting,
        Self::RestartFailed,
        Self::Paused,
        Self::Resuming,
        Self::ResumeFailed,
        Self::Sleeping,
    ];

    /// Failure states.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::BuildFailed | Self::StartFailed | Self::RestartFailed | Self::ResumeFailed
        )
    }

    /// Whether the stored reason is meaningful for this status.
    ///
    /// Failure states accept a status update that carries a reason and are
    /// the only states a retry leads out of.
    pub fn is_update_status_accept(&self) -> bool {
        self.is_failure()
    }

    /// Image build in progress.
    pub fn is_building(&self) -> bool {
        matches!(self, Self::Building)
    }

    /// Serving traffic.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Serving)
    }
}

impl fmt::Display for SpaceAppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition request, usually driven by a build or deploy callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppTransition {
    /// Image build started.
    StartBuild {
        /// Where the build log streams.
        build_log_url: String,
    },
    /// Image build failed.
    BuildFailed {
        /// Failure detail.
        reason: String,
    },
    /// Image build succeeded; the container is starting.
    BuildSucceeded,
    /// Container failed to start.
    StartFailed {
        /// Failure detail.
        reason: String,
    },
    /// Container is serving.
    ServingConfirmed {
        /// Public app URL.
        app_url: String,
        /// App log URL.
        app_log_url: String,
    },
    /// Restart requested.
    Restart,
    /// Restart failed.
    RestartFailed {
        /// Failure detail.
        reason: String,
    },
    /// Pause requested.
    Pause,
    /// Resume requested.
    Resume,
    /// Resume failed.
    ResumeFailed {
        /// Failure detail.
        reason: String,
    },
    /// Idle sleep.
    Sleep,
}

impl AppTransition {
    /// Transition name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartBuild { .. } => "start_build",
            Self::BuildFailed { .. } => "build_failed",
            Self::BuildSucceeded => "build_succeeded",
            Self::StartFailed { .. } => "start_failed",
            Self::ServingConfirmed { .. } => "serving_confirmed",
            Self::Restart => "restart",
            Self::RestartFailed { .. } => "restart_failed",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::ResumeFailed { .. } => "resume_failed",
            Self::Sleep => "sleep",
        }
    }

    /// Statuses from which this transition is legal.
    pub fn sources(&self) -> &'static [SpaceAppStatus] {
        use SpaceAppStatus::*;
        match self {
            Self::StartBuild { .. } => &[Init, BuildFailed],
            Self::BuildFailed { .. } | Self::BuildSucceeded => &[Building],
            Self::StartFailed { .. } => &[Starting],
            Self::ServingConfirmed { .. } => &[Starting, Restarting, Resuming],
            Self::Restart => &[Serving, StartFailed, RestartFailed],
            Self::RestartFailed { .. } => &[Restarting],
            Self::Pause => &[Serving],
            Self::Resume => &[Paused, Sleeping, ResumeFailed],
            Self::ResumeFailed { .. } => &[Resuming],
            Self::Sleep => &[Serving],
        }
    }

    /// Status reached by this transition.
    pub fn target(&self) -> SpaceAppStatus {
        match self {
            Self::StartBuild { .. } => SpaceAppStatus::Building,
            Self::BuildFailed { .. } => SpaceAppStatus::BuildFailed,
            Self::BuildSucceeded => SpaceAppStatus::Starting,
            Self::StartFailed { .. } => SpaceAppStatus::StartFailed,
            Self::ServingConfirmed { .. } => SpaceAppStatus::Serving,
            Self::Restart => SpaceAppStatus::Restarting,
            Self::RestartFailed { .. } => SpaceAppStatus::RestartFailed,
            Self::Pause => SpaceAppStatus::Paused,
            Self::Resume => SpaceAppStatus::Resuming,
            Self::ResumeFailed { .. } => SpaceAppStatus::ResumeFailed,
            Self::Sleep => SpaceAppStatus::Sleeping,
        }
    }

    /// Whether this transition is legal from `status`.
    pub fn is_legal_from(&self, status: SpaceAppStatus) -> bool {
        self.sources().contains(&status)
    }
}

/// Build/serve state of one Space at one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceApp {
    /// Key.
    pub index: SpaceAppIndex,
    /// Current status.
    pub status: SpaceAppStatus,
    /// Failure detail of the last failed transition.
    pub reason: Option<String>,
    /// Public app URL.
    pub app_url: Option<String>,
    /// App log URL.
    pub app_log_url: Option<String>,
    /// Build log URL.
    pub build_log_url: Option<String>,
    /// When the last restart was requested.
    pub restarted_at: Option<DateTime<Utc>>,
    /// When the last resume was requested.
    pub resumed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter.
    pub version: u64,
}

impl SpaceApp {
    /// A fresh app in `Init` for a newly observed commit.
    pub fn new(index: SpaceAppIndex) -> Self {
        Self {
            index,
            status: SpaceAppStatus::Init,
            reason: None,
            app_url: None,
            app_log_url: None,
            build_log_url: None,
            restarted_at: None,
            resumed_at: None,
            version: 0,
        }
    }

    /// Failure detail, only while in a failure state.
    pub fn reason(&self) -> Option<&str> {
        if self.status.is_update_status_accept() {
            self.reason.as_deref()
        } else {
            None
        }
    }

    /// Apply a transition at `now`.
    ///
    /// The guard runs before any field is touched, so a rejected transition
    /// leaves the app as it was. The version is not changed here; the store
    /// bumps it on a successful compare-and-set.
    pub fn apply(&mut self, transition: AppTransition, now: DateTime<Utc>) -> Result<()> {
        if !transition.is_legal_from(self.status) {
            return Err(Error::UnmatchedAppStatus {
                transition: transition.name(),
                status: self.status,
            });
        }

        self.status = transition.target();

        match transition {
            AppTransition::StartBuild { build_log_url } => {
                self.build_log_url = Some(build_log_url);
                self.reason = None;
            }
            AppTransition::BuildFailed { reason }
            | AppTransition::StartFailed { reason }
            | AppTransition::RestartFailed { reason }
            | AppTransition::ResumeFailed { reason } => {
                self.reason = Some(reason);
            }
            AppTransition::ServingConfirmed {
                app_url,
                app_log_url,
            } => {
                self.app_url = Some(app_url);
                self.app_log_url = Some(app_log_url);
                self.reason = None;
            }
            AppTransition::Restart => {
                self.restarted_at = Some(now);
                self.reason = None;
            }
            AppTransition::Resume => {
                self.resumed_at = Some(now);
                self.reason = None;
            }
            AppTransition::BuildSucceeded | AppTransition::Pause | AppTransition::Sleep => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_transitions() -> Vec<AppTransition> {
        vec![
            AppTransition::StartBuild {
                build_log_url: "https://logs/build".to_string(),
            },
            AppTransition::BuildFailed {
                reason: "oom".to_string(),
            },
            AppTransition::BuildSucceeded,
            AppTransition::StartFailed {
                reason: "crash".to_string(),
            },
            AppTransition::ServingConfirmed {
                app_url: "https://app".to_string(),
                app_log_url: "https://logs/app".to_string(),
            },
            AppTransition::Restart,
            AppTransition::RestartFailed {
                reason: "timeout".to_string(),
            },
            AppTransition::Pause,
            AppTransition::Resume,
            AppTransition::ResumeFailed {
                reason: "no capacity".to_string(),
            },
            AppTransition::Sleep,
        ]
    }

    fn allowed(from: SpaceAppStatus, name: &str) -> bool {
        use SpaceAppStatus::*;
        matches!(
            (from, name),
            (Init, "start_build")
                | (BuildFailed, "start_build")
                | (Building, "build_failed")
                | (Building, "build_succeeded")
                | (Starting, "start_failed")
                | (Starting, "serving_confirmed")
                | (Restarting, "serving_confirmed")
                | (Resuming, "serving_confirmed")
                | (Serving, "restart")
                | (StartFailed, "restart")
                | (RestartFailed, "restart")
                | (Restarting, "restart_failed")
                | (Serving, "pause")
                | (Paused, "resume")
                | (Sleeping, "resume")
                | (ResumeFailed, "resume")
                | (Resuming, "resume_failed")
                | (Serving, "sleep")
        )
    }

    fn app_in(status: SpaceAppStatus) -> SpaceApp {
        let mut app = SpaceApp::new(SpaceAppIndex::new("space-1", "c1"));
        app.status = status;
        app.version = 7;
        app
    }

    #[test]
    fn test_status_roundtrip() {
        for status in SpaceAppStatus::ALL {
            assert_eq!(SpaceAppStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SpaceAppStatus::parse("bogus"), None);
    }

    #[test]
    fn test_transition_legality_matrix() {
        let now = Utc::now();
        for status in SpaceAppStatus::ALL {
            for transition in all_transitions() {
                let name = transition.name();
                let mut app = app_in(status);
                let before = app.clone();
                let result = app.apply(transition.clone(), now);

                if allowed(status, name) {
                    assert!(result.is_ok(), "{} from {} should be legal", name, status);
                    assert_eq!(app.status, transition.target());
                } else {
                    match result {
                        Err(Error::UnmatchedAppStatus {
                            transition: t,
                            status: s,
                        }) => {
                            assert_eq!(t, name);
                            assert_eq!(s, status);
                        }
                        other => panic!(
                            "{} from {}: expected rejection, got {:?}",
                            name, status, other
                        ),
                    }
                    assert_eq!(app, before, "rejected transition must not mutate");
                }
                assert_eq!(app.version, 7, "apply never touches the version");
            }
        }
    }

    #[test]
    fn test_happy_path_sets_fields() {
        let now = Utc::now();
        let mut app = SpaceApp::new(SpaceAppIndex::new("space-1", "c1"));
        app.apply(
            AppTransition::StartBuild {
                build_log_url: "https://logs/build".to_string(),
            },
            now,
        )
        .unwrap();
        assert_eq!(app.build_log_url.as_deref(), Some("https://logs/build"));

        app.apply(AppTransition::BuildSucceeded, now).unwrap();
        app.apply(
            AppTransition::ServingConfirmed {
                app_url: "https://app".to_string(),
                app_log_url: "https://logs/app".to_string(),
            },
            now,
        )
        .unwrap();

        assert_eq!(app.status, SpaceAppStatus::Serving);
        assert_eq!(app.app_url.as_deref(), Some("https://app"));
        assert_eq!(app.app_log_url.as_deref(), Some("https://logs/app"));
    }

    #[test]
    fn test_reason_only_visible_in_failure_states() {
        let now = Utc::now();
        let mut app = app_in(SpaceAppStatus::Starting);
        app.apply(
            AppTransition::StartFailed {
                reason: "port in use".to_string(),
            },
            now,
        )
        .unwrap();
        assert_eq!(app.reason(), Some("port in use"));

        app.apply(AppTransition::Restart, now).unwrap();
        assert_eq!(app.status, SpaceAppStatus::Restarting);
        assert_eq!(app.reason(), None);
        assert_eq!(app.restarted_at, Some(now));
    }

    #[test]
    fn test_rebuild_after_build_failure() {
        let now = Utc::now();
        let mut app = app_in(SpaceAppStatus::Building);
        app.apply(
            AppTransition::BuildFailed {
                reason: "missing requirements.txt".to_string(),
            },
            now,
        )
        .unwrap();
        assert_eq!(app.reason(), Some("missing requirements.txt"));

        app.apply(
            AppTransition::StartBuild {
                build_log_url: "https://logs/rebuild".to_string(),
            },
            now,
        )
        .unwrap();

        assert_eq!(app.status, SpaceAppStatus::Building);
        assert_eq!(app.reason, None);
        assert_eq!(app.build_log_url.as_deref(), Some("https://logs/rebuild"));
    }

    #[test]
    fn test_resume_records_timestamp() {
        let now = Utc::now();
        let mut app = app_in(SpaceAppStatus::Sleeping);
        app.apply(AppTransition::Resume, now).unwrap();
        assert_eq!(app.status, SpaceAppStatus::Resuming);
        assert_eq!(app.resumed_at, Some(now));
    }

    #[test]
    fn test_serving_before_starting_is_rejected() {
        let mut app = app_in(SpaceAppStatus::Building);
        let err = app
            .apply(
                AppTransition::ServingConfirmed {
                    app_url: "u".to_string(),
                    app_log_url: "l".to_string(),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unmatched app status: cannot apply 'serving_confirmed' while building"
        );
    }
}
