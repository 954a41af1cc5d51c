//! Notification store and the dispatch fan-out run after state transitions
use std::collections::BTreeSet;

use anyhow::Result;
use chrono::Utc;

use super::directory::DirectoryStore;
use super::leave::{
    ApprovalStatus, Decision, LeaveDate, LeaveRequest, Period, TimeStamp, is_real_name,
};
use super::utils::{self, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum NotificationKind {
    #[n(0)]
    Info,
    #[n(1)]
    Success,
    #[n(2)]
    Warning,
}

// key is the notification id, value is this record encoded into cbor
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct AppNotification {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub message: String,
    #[n(3)]
    pub kind: NotificationKind,
    #[n(4)]
    pub is_read: bool,
    #[n(5)]
    pub timestamp: TimeStamp<Utc>,
    #[n(6)]
    pub leave_id: String,
}

/// Keyed store over the `notifications` tree. Records are created as side
/// effects of transitions and only ever mutated by flipping `is_read`.
#[derive(Clone)]
pub struct NotificationStore {
    tree: sled::Tree,
}

impl NotificationStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree("notifications")?,
        })
    }

    pub fn push(&self, notification: &AppNotification) -> Result<()> {
        self.tree
            .insert(notification.id.as_bytes(), minicbor::to_vec(notification)?)?;
        Ok(())
    }

    /// A recipient's notifications, newest first.
    pub fn for_user(&self, user_id: &str) -> Result<Vec<AppNotification>> {
        let mut list = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item?;
            let notification: AppNotification = minicbor::decode(&value)?;
            if notification.user_id == user_id {
                list.push(notification);
            }
        }
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(list)
    }

    /// Flip every unread notification for the recipient. Returns how many
    /// were touched.
    pub fn mark_read(&self, user_id: &str) -> Result<usize> {
        let mut touched = 0;
        for item in self.tree.iter() {
            let (key, value) = item?;
            let mut notification: AppNotification = minicbor::decode(&value)?;
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                self.tree.insert(key, minicbor::to_vec(&notification)?)?;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

/// Every (date, colleague) pair whose coverage slot sits at Pending, one
/// entry per colleague per day regardless of how many slots they cover.
pub fn pending_assignees(leave: &LeaveRequest) -> Vec<(LeaveDate, String)> {
    let mut seen: BTreeSet<(LeaveDate, String)> = BTreeSet::new();
    let mut pairs = Vec::new();
    for (date, statuses) in &leave.acting_staff_statuses {
        for (period, status) in statuses {
            if *status != ApprovalStatus::Pending {
                continue;
            }
            let Some(name) = leave.acting_staff.get(date).and_then(|day| day.get(period)) else {
                continue;
            };
            if is_real_name(name) && seen.insert((*date, normalize(name))) {
                pairs.push((*date, name.clone()));
            }
        }
    }
    pairs
}

fn build(user_id: &str, leave_id: &str, message: String, kind: NotificationKind) -> Result<AppNotification> {
    Ok(AppNotification {
        id: utils::new_uuid_to_bech32("notif")?,
        user_id: user_id.to_string(),
        message,
        kind,
        is_read: false,
        timestamp: TimeStamp::new(),
        leave_id: leave_id.to_string(),
    })
}

/// Notify every colleague holding a Pending slot that cover is requested.
/// `sender` names the delegating HoD when the assignment came through the
/// delegated path. Recipients resolve by case-insensitive display name; a
/// miss is logged as a data-integrity warning and skipped. Returns the
/// number of notifications dispatched.
pub fn dispatch_coverage_requests(
    directory: &DirectoryStore,
    store: &NotificationStore,
    leave: &LeaveRequest,
    sender: Option<&str>,
) -> Result<usize> {
    let mut dispatched = 0;
    for (date, name) in pending_assignees(leave) {
        match directory.find_by_name(&name)? {
            Some(colleague) => {
                let message = match sender {
                    Some(hod) => format!(
                        "{hod} (HoD) has assigned you a session coverage duty for {} on {date}. Check Duty Requests.",
                        leave.name
                    ),
                    None => format!(
                        "{} has requested you for session coverage on {date}. Check Duty Requests.",
                        leave.name
                    ),
                };
                store.push(&build(&colleague.id, &leave.id, message, NotificationKind::Info)?)?;
                dispatched += 1;
            }
            None => {
                log::warn!(
                    "acting staff '{name}' on leave {} has no directory entry; coverage notification dropped",
                    leave.id
                );
            }
        }
    }
    Ok(dispatched)
}

/// Tell the requester how a colleague answered their duty request. The
/// message summarizes the last touched date and every affected slot.
pub fn dispatch_coverage_response(
    store: &NotificationStore,
    leave: &LeaveRequest,
    colleague_name: &str,
    decision: Decision,
    affected: &[(LeaveDate, Period)],
) -> Result<()> {
    let Some((last_date, _)) = affected.last() else {
        return Ok(());
    };
    let periods: Vec<&str> = affected.iter().map(|(_, p)| p.label()).collect();
    let verb = match decision {
        Decision::Approved => "approved",
        Decision::Rejected => "rejected",
    };
    let kind = match decision {
        Decision::Approved => NotificationKind::Success,
        Decision::Rejected => NotificationKind::Warning,
    };
    let message = format!(
        "{colleague_name} has {verb} your duty request for {last_date} ({}).",
        periods.join(", ")
    );
    store.push(&build(&leave.user_id, &leave.id, message, kind)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage;
    use crate::leave::AssignmentMatrix;

    fn leave_with_matrix(matrix: AssignmentMatrix) -> LeaveRequest {
        let dates: Vec<_> = matrix.keys().copied().collect();
        let statuses = coverage::derive_statuses(&dates, &matrix);
        LeaveRequest {
            id: "leave_test".into(),
            user_id: "user_req".into(),
            name: "Ms.Bhavya.P".into(),
            is_teaching_staff: true,
            department: Some("Computer Science".into()),
            from_date: *dates.first().unwrap(),
            to_date: *dates.last().unwrap(),
            day_type: crate::leave::DayType::FullDay,
            purpose: crate::leave::LeavePurpose::Others,
            acting_staff: matrix,
            acting_staff_statuses: statuses,
            has_medical_certificate: false,
            final_letter_content: String::new(),
            submitted_at: TimeStamp::new(),
            time: None,
            sections: vec![],
            status: crate::leave::LeaveStatus::Pending,
            hod_approval: ApprovalStatus::Pending,
            admin_approval: ApprovalStatus::Pending,
            approver_name: None,
            approver_role: None,
            hod_duty_assignment: false,
        }
    }

    #[test]
    fn pending_assignees_dedupes_per_colleague_per_day() {
        let date1 = LeaveDate::from_ymd(2024, 3, 5).unwrap();
        let date2 = LeaveDate::from_ymd(2024, 3, 6).unwrap();

        let mut matrix = AssignmentMatrix::new();
        let mut day1 = coverage::empty_day();
        day1.insert(Period::P1, "Dr.SathyaPriya.S".into());
        day1.insert(Period::P2, "dr.sathyapriya.s".into()); // same colleague, case drift
        day1.insert(Period::P3, "Ms.Hemalatha.D".into());
        matrix.insert(date1, day1);
        let mut day2 = coverage::empty_day();
        day2.insert(Period::P1, "Dr.SathyaPriya.S".into());
        matrix.insert(date2, day2);

        let pairs = pending_assignees(&leave_with_matrix(matrix));
        // P1/P2 on the same day collapse; the second day counts again
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs.iter().filter(|(d, _)| *d == date1).count(), 2);
        assert_eq!(pairs.iter().filter(|(d, _)| *d == date2).count(), 1);
    }

    #[test]
    fn for_user_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("notify_order.db")).unwrap();
        let store = NotificationStore::open(&db).unwrap();

        let mut older = build("user_a", "leave_x", "older".into(), NotificationKind::Info).unwrap();
        older.timestamp = TimeStamp::new_with(2024, 3, 5, 8, 0, 0);
        let mut newer = build("user_a", "leave_x", "newer".into(), NotificationKind::Info).unwrap();
        newer.timestamp = TimeStamp::new_with(2024, 3, 5, 9, 0, 0);
        store.push(&older).unwrap();
        store.push(&newer).unwrap();

        let list = store.for_user("user_a").unwrap();
        assert_eq!(list[0].message, "newer");
        assert_eq!(list[1].message, "older");
    }

    #[test]
    fn mark_read_flips_only_the_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("notify.db")).unwrap();
        let store = NotificationStore::open(&db).unwrap();

        for user in ["user_a", "user_a", "user_b"] {
            store
                .push(&build(user, "leave_x", "hello".into(), NotificationKind::Info).unwrap())
                .unwrap();
        }

        assert_eq!(store.mark_read("user_a").unwrap(), 2);
        assert!(store.for_user("user_a").unwrap().iter().all(|n| n.is_read));
        assert!(store.for_user("user_b").unwrap().iter().all(|n| !n.is_read));
        // second pass finds nothing unread
        assert_eq!(store.mark_read("user_a").unwrap(), 0);
    }
}
