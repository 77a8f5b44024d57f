//! Job item state tracking.
//!
//! Transitions are planned here without touching storage; the caller applies the
//! returned plan. Every check runs before anything is written.
//!
//! ```text
//! PENDING -> IN_PROGRESS -> DONE
//!                 |  ^
//!                 v  |
//!             ISSUE_FOUND
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{JobItemStatus, PhotoEvidence, UserRole};

/// Message shown when DONE is attempted without photo evidence.
pub const MISSING_PHOTOS_MESSAGE: &str =
    "Both a BEFORE photo and an AFTER photo are required before marking this job DONE";

/// Who is acting on a job item.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// The parts of a job item the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct JobItemSnapshot {
    pub status: JobItemStatus,
    pub technician_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
}

/// Notification-worthy outcome of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Completed,
    IssueFound,
    Resumed,
}

/// Changes to apply for an accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: JobItemStatus,
    pub to: JobItemStatus,
    /// Technician to record as assignee, when the item was unassigned
    pub assign_technician: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub event: LifecycleEvent,
}

/// Ownership rule shared by every job item mutation.
///
/// Admins may act on any item. Technicians may act on unassigned items and
/// their own. Clients never mutate job items.
pub fn authorize_mutation(actor: &Actor, technician_id: Option<Uuid>) -> AppResult<()> {
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::Technician => match technician_id {
            None => Ok(()),
            Some(assignee) if assignee == actor.user_id => Ok(()),
            Some(_) => Err(AppError::unauthorized(
                "job item is assigned to another technician",
            )),
        },
        UserRole::Client => Err(AppError::unauthorized("clients cannot modify job items")),
    }
}

/// Validate a status change and work out what it writes.
pub fn plan_transition(
    actor: &Actor,
    item: &JobItemSnapshot,
    target: JobItemStatus,
    evidence: &PhotoEvidence,
    now: DateTime<Utc>,
) -> AppResult<TransitionPlan> {
    authorize_mutation(actor, item.technician_id)?;

    use JobItemStatus::*;

    let event = match (item.status, target) {
        (Done, _) => {
            return Err(AppError::InvalidInput(
                "This job is already DONE and can no longer change status".to_string(),
            ));
        }
        (from, to) if from == to => {
            return Err(AppError::InvalidInput(format!("This job is already {}", to)));
        }
        (Pending, InProgress) => LifecycleEvent::Started,
        (InProgress, Done) => {
            if !evidence.has_before_and_after() {
                return Err(AppError::InvalidInput(MISSING_PHOTOS_MESSAGE.to_string()));
            }
            LifecycleEvent::Completed
        }
        (InProgress, IssueFound) => LifecycleEvent::IssueFound,
        (IssueFound, InProgress) => LifecycleEvent::Resumed,
        (from, to) => {
            return Err(AppError::InvalidInput(format!(
                "A job cannot move from {} to {}",
                from, to
            )));
        }
    };

    let assign_technician = match (actor.role, item.technician_id, target) {
        (UserRole::Technician, None, InProgress) => Some(actor.user_id),
        _ => None,
    };

    Ok(TransitionPlan {
        from: item.status,
        to: target,
        assign_technician,
        start_time: match event {
            LifecycleEvent::Started => Some(now),
            _ => item.start_time,
        },
        end_time: (event == LifecycleEvent::Completed).then_some(now),
        event,
    })
}

/// Statuses reachable from `status`, in the order the job page offers them.
pub fn allowed_targets(status: JobItemStatus) -> &'static [JobItemStatus] {
    use JobItemStatus::*;
    match status {
        Pending => &[InProgress],
        InProgress => &[Done, IssueFound],
        IssueFound => &[InProgress],
        Done => &[],
    }
}

/// True when a photo may still be removed from an item in this status.
pub fn photos_are_mutable(status: JobItemStatus) -> bool {
    status != JobItemStatus::Done
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
    }

    fn technician(id: Uuid) -> Actor {
        Actor {
            user_id: id,
            role: UserRole::Technician,
        }
    }

    fn admin() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
        }
    }

    fn item(status: JobItemStatus, technician_id: Option<Uuid>) -> JobItemSnapshot {
        JobItemSnapshot {
            status,
            technician_id,
            start_time: None,
        }
    }

    fn photos(before: u64, after: u64) -> PhotoEvidence {
        PhotoEvidence { before, after }
    }

    #[test]
    fn test_unassigned_technician_start_auto_assigns() {
        let tech = Uuid::new_v4();
        let plan = plan_transition(
            &technician(tech),
            &item(JobItemStatus::Pending, None),
            JobItemStatus::InProgress,
            &photos(0, 0),
            now(),
        )
        .unwrap();
        assert_eq!(plan.assign_technician, Some(tech));
        assert_eq!(plan.start_time, Some(now()));
        assert_eq!(plan.end_time, None);
        assert_eq!(plan.event, LifecycleEvent::Started);
    }

    #[test]
    fn test_admin_start_does_not_assign() {
        let plan = plan_transition(
            &admin(),
            &item(JobItemStatus::Pending, None),
            JobItemStatus::InProgress,
            &photos(0, 0),
            now(),
        )
        .unwrap();
        assert_eq!(plan.assign_technician, None);
    }

    #[test]
    fn test_done_requires_before_and_after() {
        let tech = Uuid::new_v4();
        for (before, after) in [(0, 0), (1, 0), (0, 1)] {
            let err = plan_transition(
                &technician(tech),
                &item(JobItemStatus::InProgress, Some(tech)),
                JobItemStatus::Done,
                &photos(before, after),
                now(),
            )
            .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_done_with_one_before_and_no_after_names_both_photo_kinds() {
        let tech = Uuid::new_v4();
        let err = plan_transition(
            &technician(tech),
            &item(JobItemStatus::InProgress, Some(tech)),
            JobItemStatus::Done,
            &photos(1, 0),
            now(),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("BEFORE"));
        assert!(message.contains("AFTER"));
    }

    #[test]
    fn test_done_stamps_end_time_and_keeps_start() {
        let tech = Uuid::new_v4();
        let started = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let snapshot = JobItemSnapshot {
            status: JobItemStatus::InProgress,
            technician_id: Some(tech),
            start_time: Some(started),
        };
        let plan = plan_transition(
            &technician(tech),
            &snapshot,
            JobItemStatus::Done,
            &photos(1, 2),
            now(),
        )
        .unwrap();
        assert_eq!(plan.start_time, Some(started));
        assert_eq!(plan.end_time, Some(now()));
        assert_eq!(plan.event, LifecycleEvent::Completed);
    }

    #[test]
    fn test_other_technicians_item_is_an_authorization_failure() {
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let err = plan_transition(
            &technician(intruder),
            &item(JobItemStatus::InProgress, Some(owner)),
            JobItemStatus::Done,
            &photos(1, 1),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_clients_cannot_transition() {
        let client = Actor {
            user_id: Uuid::new_v4(),
            role: UserRole::Client,
        };
        let err = plan_transition(
            &client,
            &item(JobItemStatus::Pending, None),
            JobItemStatus::InProgress,
            &photos(0, 0),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_issue_found_and_resume() {
        let tech = Uuid::new_v4();
        let plan = plan_transition(
            &technician(tech),
            &item(JobItemStatus::InProgress, Some(tech)),
            JobItemStatus::IssueFound,
            &photos(0, 0),
            now(),
        )
        .unwrap();
        assert_eq!(plan.event, LifecycleEvent::IssueFound);

        let plan = plan_transition(
            &technician(tech),
            &item(JobItemStatus::IssueFound, Some(tech)),
            JobItemStatus::InProgress,
            &photos(0, 0),
            now(),
        )
        .unwrap();
        assert_eq!(plan.event, LifecycleEvent::Resumed);
        assert_eq!(plan.start_time, None);
    }

    #[test]
    fn test_done_is_terminal() {
        for target in [
            JobItemStatus::Pending,
            JobItemStatus::InProgress,
            JobItemStatus::IssueFound,
        ] {
            let err = plan_transition(
                &admin(),
                &item(JobItemStatus::Done, None),
                target,
                &photos(1, 1),
                now(),
            )
            .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_invalid_jumps_are_rejected() {
        let err = plan_transition(
            &admin(),
            &item(JobItemStatus::Pending, None),
            JobItemStatus::Done,
            &photos(1, 1),
            now(),
        )
        .unwrap_err();
        assert!(err.is_validation());

        let err = plan_transition(
            &admin(),
            &item(JobItemStatus::Pending, None),
            JobItemStatus::IssueFound,
            &photos(0, 0),
            now(),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_photos_locked_once_done() {
        assert!(photos_are_mutable(JobItemStatus::InProgress));
        assert!(!photos_are_mutable(JobItemStatus::Done));
    }

    #[test]
    fn test_allowed_targets_match_the_planner() {
        let actor = admin();
        for from in [
            JobItemStatus::Pending,
            JobItemStatus::InProgress,
            JobItemStatus::IssueFound,
            JobItemStatus::Done,
        ] {
            for to in allowed_targets(from) {
                let plan = plan_transition(&actor, &item(from, None), *to, &photos(1, 1), now());
                assert!(plan.is_ok(), "{} -> {} should be allowed", from, to);
            }
        }
        assert!(allowed_targets(JobItemStatus::Done).is_empty());
    }
}
