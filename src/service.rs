//! Service layer API for the leave workflow operations
use std::sync::{Arc, Mutex, mpsc};

use anyhow::Result;

use super::approval;
use super::coverage;
use super::directory::{DirectoryStore, Gender, User};
use super::export;
use super::leave::{AssignmentMatrix, Decision, LeaveDate, LeaveDraft, LeaveRequest, Period};
use super::letter::{self, LetterDrafter, LetterInput};
use super::notify::{self, AppNotification, NotificationStore};
use super::utils::normalize;

/// Broadcast after every mutation so same-process observers refresh
/// without polling the store on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Users,
    Leaves,
    Notifications,
}

pub struct LeaveService {
    directory: DirectoryStore,
    leaves: sled::Tree,
    notifications: NotificationStore,
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
}

impl LeaveService {
    /// Open the store trees and sync the official roster.
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        let directory = DirectoryStore::open(&instance)?;
        let leaves = instance.open_tree("leaves")?;
        let notifications = NotificationStore::open(&instance)?;
        Ok(Self {
            directory,
            leaves,
            notifications,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn directory(&self) -> &DirectoryStore {
        &self.directory
    }

    /// Hand out a change-event receiver. Dropped receivers are pruned on
    /// the next broadcast.
    pub fn subscribe(&self) -> mpsc::Receiver<ChangeEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        receiver
    }

    fn emit(&self, event: ChangeEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|subscriber| subscriber.send(event).is_ok());
    }

    fn save_leave(&self, leave: &LeaveRequest) -> Result<()> {
        self.leaves
            .insert(leave.id.as_bytes(), minicbor::to_vec(leave)?)?;
        Ok(())
    }

    /// Load a leave record from the store.
    fn load_leave(&self, leave_id: &str) -> Result<Option<LeaveRequest>> {
        match self.leaves.get(leave_id.as_bytes())? {
            Some(value) => Ok(Some(minicbor::decode(&value)?)),
            None => Ok(None),
        }
    }

    // --- directory operations ---

    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        department: &str,
        gender: Gender,
    ) -> Result<User> {
        let user = self.directory.register(name, email, password, department, gender)?;
        self.emit(ChangeEvent::Users);
        Ok(user)
    }

    pub fn save_user(&self, user: User) -> Result<User> {
        let user = self.directory.save_user(user)?;
        self.emit(ChangeEvent::Users);
        Ok(user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Option<User>> {
        self.directory.login(email, password)
    }

    pub fn logout(&self) -> Result<()> {
        self.directory.logout()
    }

    pub fn current_user(&self) -> Result<Option<User>> {
        self.directory.current_user()
    }

    /// Colleagues a requester may name for coverage: their department's
    /// roster minus themselves.
    pub fn coverage_candidates(&self, requester: &User) -> Result<Vec<User>> {
        let Some(department) = requester.department.as_deref() else {
            return Ok(Vec::new());
        };
        let staff = self.directory.staff_by_department(department)?;
        Ok(coverage::candidates(staff, &requester.email))
    }

    // --- leave reads ---

    /// Every leave request, newest first.
    pub fn leaves(&self) -> Result<Vec<LeaveRequest>> {
        let mut all = Vec::new();
        for item in self.leaves.iter() {
            let (_, value) = item?;
            all.push(minicbor::decode::<LeaveRequest>(&value)?);
        }
        all.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(all)
    }

    pub fn leaves_for_user(&self, user_id: &str) -> Result<Vec<LeaveRequest>> {
        Ok(self
            .leaves()?
            .into_iter()
            .filter(|leave| leave.user_id == user_id)
            .collect())
    }

    pub fn leave(&self, leave_id: &str) -> Result<Option<LeaveRequest>> {
        self.load_leave(leave_id)
    }

    /// Requests on an authority's dashboard, pending and decided alike.
    pub fn leaves_for_authority(&self, authority: &User) -> Result<Vec<LeaveRequest>> {
        Ok(self
            .leaves()?
            .into_iter()
            .filter(|leave| approval::visible_to_authority(leave, authority))
            .collect())
    }

    /// The "pending my action" queue for an authority.
    pub fn pending_for_authority(&self, authority: &User) -> Result<Vec<LeaveRequest>> {
        Ok(self
            .leaves()?
            .into_iter()
            .filter(|leave| approval::pending_action(leave, authority))
            .collect())
    }

    /// Requests in which the named colleague covers at least one session.
    pub fn acting_requests(&self, colleague_name: &str) -> Result<Vec<LeaveRequest>> {
        Ok(self
            .leaves()?
            .into_iter()
            .filter(|leave| leave.assigns_to(colleague_name))
            .collect())
    }

    // --- core mutations ---

    /// Submit a new leave request for approval. Validates the draft,
    /// persists the record and notifies every colleague holding a
    /// Pending coverage slot.
    pub fn submit_leave(&self, requester: &User, draft: LeaveDraft) -> Result<LeaveRequest> {
        let leave = draft.build(requester)?;
        self.save_leave(&leave)?;

        let dispatched =
            notify::dispatch_coverage_requests(&self.directory, &self.notifications, &leave, None)?;
        log::info!(
            "leave {} submitted by {} ({} coverage notifications)",
            leave.id,
            leave.name,
            dispatched
        );

        self.emit(ChangeEvent::Leaves);
        if dispatched > 0 {
            self.emit(ChangeEvent::Notifications);
        }
        Ok(leave)
    }

    /// Direct HoD approve/reject. Approving while the coverage
    /// assignment is still delegated is refused; an unknown leave id
    /// silently no-ops.
    pub fn hod_decide(
        &self,
        leave_id: &str,
        authority: &User,
        decision: Decision,
    ) -> Result<Option<LeaveRequest>> {
        let Some(mut leave) = self.load_leave(leave_id)? else {
            log::debug!("hod decision on unknown leave {leave_id}; ignored");
            return Ok(None);
        };
        approval::hod_decision(&mut leave, authority, decision)?;
        self.save_leave(&leave)?;
        log::info!("leave {} {} by HoD {}", leave.id, decision, authority.name);
        self.emit(ChangeEvent::Leaves);
        Ok(Some(leave))
    }

    /// Delegated assignment: the convenience composite of the atomic
    /// assignment rewrite and an HoD approval, matching the dashboard's
    /// single "assign duties" action. Newly Pending colleagues are
    /// notified with the HoD named as delegator.
    pub fn hod_assign_duties(
        &self,
        leave_id: &str,
        authority: &User,
        matrix: AssignmentMatrix,
    ) -> Result<Option<LeaveRequest>> {
        let Some(mut leave) = self.load_leave(leave_id)? else {
            log::debug!("duty assignment on unknown leave {leave_id}; ignored");
            return Ok(None);
        };
        approval::apply_assignment(&mut leave, matrix);
        approval::hod_decision(&mut leave, authority, Decision::Approved)?;
        self.save_leave(&leave)?;

        let dispatched = notify::dispatch_coverage_requests(
            &self.directory,
            &self.notifications,
            &leave,
            Some(&authority.name),
        )?;
        log::info!(
            "leave {} duties assigned by HoD {} ({} coverage notifications)",
            leave.id,
            authority.name,
            dispatched
        );

        self.emit(ChangeEvent::Leaves);
        if dispatched > 0 {
            self.emit(ChangeEvent::Notifications);
        }
        Ok(Some(leave))
    }

    /// Administration approve/reject; authoritative for the aggregate
    /// status.
    pub fn admin_decide(
        &self,
        leave_id: &str,
        authority: &User,
        decision: Decision,
    ) -> Result<Option<LeaveRequest>> {
        let Some(mut leave) = self.load_leave(leave_id)? else {
            log::debug!("admin decision on unknown leave {leave_id}; ignored");
            return Ok(None);
        };
        approval::admin_decision(&mut leave, authority, decision)?;
        self.save_leave(&leave)?;
        log::info!(
            "leave {} {} by {} ({})",
            leave.id,
            decision,
            authority.name,
            authority.role
        );
        self.emit(ChangeEvent::Leaves);
        Ok(Some(leave))
    }

    /// A colleague answers their duty request: every (date, slot)
    /// assigned to them on this leave resolves in one action, and the
    /// requester is told the outcome. Coverage acceptance is tracked
    /// independently of the approval chain.
    pub fn respond_to_duty(
        &self,
        leave_id: &str,
        colleague_name: &str,
        decision: Decision,
    ) -> Result<Option<LeaveRequest>> {
        let Some(mut leave) = self.load_leave(leave_id)? else {
            log::debug!("duty response on unknown leave {leave_id}; ignored");
            return Ok(None);
        };

        let target = normalize(colleague_name);
        let mut affected: Vec<(LeaveDate, Period)> = Vec::new();
        for (date, day) in &leave.acting_staff {
            for (period, name) in day {
                if crate::leave::is_real_name(name) && normalize(name) == target {
                    affected.push((*date, *period));
                }
            }
        }
        if affected.is_empty() {
            log::debug!("no slots on leave {leave_id} assigned to '{colleague_name}'");
            return Ok(Some(leave));
        }

        for (date, period) in &affected {
            leave
                .acting_staff_statuses
                .entry(*date)
                .or_default()
                .insert(*period, decision.as_status());
        }
        self.save_leave(&leave)?;

        notify::dispatch_coverage_response(
            &self.notifications,
            &leave,
            colleague_name,
            decision,
            &affected,
        )?;
        log::info!(
            "{} {} {} coverage slot(s) on leave {}",
            colleague_name,
            decision,
            affected.len(),
            leave.id
        );

        self.emit(ChangeEvent::Leaves);
        self.emit(ChangeEvent::Notifications);
        Ok(Some(leave))
    }

    /// Produce the formal letter for a stored request through the drafting
    /// seam and persist it on the record. Drafting never fails upward; the
    /// local template stands in when the collaborator does.
    pub fn finalize_letter(
        &self,
        leave_id: &str,
        drafter: &dyn LetterDrafter,
    ) -> Result<Option<LeaveRequest>> {
        let Some(mut leave) = self.load_leave(leave_id)? else {
            log::debug!("letter drafting on unknown leave {leave_id}; ignored");
            return Ok(None);
        };
        leave.final_letter_content = letter::draft_letter(drafter, &LetterInput::from_leave(&leave));
        self.save_leave(&leave)?;
        self.emit(ChangeEvent::Leaves);
        Ok(Some(leave))
    }

    /// A user's leave history as downloadable delimited text, newest first.
    pub fn export_history(&self, user_id: &str) -> Result<String> {
        Ok(export::leave_history_csv(&self.leaves_for_user(user_id)?))
    }

    pub fn notifications(&self, user_id: &str) -> Result<Vec<AppNotification>> {
        self.notifications.for_user(user_id)
    }

    pub fn mark_notifications_read(&self, user_id: &str) -> Result<usize> {
        let touched = self.notifications.mark_read(user_id)?;
        if touched > 0 {
            self.emit(ChangeEvent::Notifications);
        }
        Ok(touched)
    }
}
