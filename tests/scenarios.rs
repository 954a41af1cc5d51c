use anyhow::Context;
use sled::open;
use std::sync::Arc;

use leave_approval::{
    coverage,
    directory::{Gender, Role, User},
    leave::{
        ApprovalStatus, AssignmentMatrix, DayType, Decision, LeaveDate, LeaveDraft, LeavePurpose,
        LeaveStatus, Period,
    },
    notify::NotificationKind,
    service::{ChangeEvent, LeaveService},
};

use tempfile::tempdir; // Use for test db cleanup.

fn date(y: i32, m: u32, d: u32) -> LeaveDate {
    LeaveDate::from_ymd(y, m, d).unwrap()
}

// Sled uses file-based locking to prevent concurrent access, so each test
// opens its own database on temp for simplified cleanup.
fn open_service(name: &str) -> anyhow::Result<(tempfile::TempDir, LeaveService)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempdir()?;
    let db = open(temp_dir.path().join(name))?;
    let service = LeaveService::new(Arc::new(db))?;
    Ok((temp_dir, service))
}

fn seeded(service: &LeaveService, email: &str) -> User {
    service
        .directory()
        .find_by_email(email)
        .unwrap()
        .unwrap_or_else(|| panic!("seed user {email} missing"))
}

#[test]
fn submit_and_two_tier_approval() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("two_tier.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let hod = seeded(&service, "lingarajmani@sankara.ac.in");
    let principal = seeded(&service, "radhikav@sankara.ac.in");
    let colleague = seeded(&service, "sathyapriya@sankara.ac.in");

    let first = date(2024, 3, 5);
    let second = date(2024, 3, 6);
    let draft = LeaveDraft::new()
        .set_from_date(first)
        .set_to_date(second)
        .set_day_type(DayType::FullDay)
        .set_purpose(LeavePurpose::MedicalLeave)
        .assign(first, Period::P1, &colleague.name)
        .assign(second, Period::P1, &colleague.name);

    let leave = service
        .submit_leave(&requester, draft)
        .context("Leave failed on submit: ")?;

    assert_eq!(leave.hod_approval, ApprovalStatus::Pending);
    assert_eq!(leave.admin_approval, ApprovalStatus::Pending);
    assert_eq!(leave.status, LeaveStatus::Pending);
    assert_eq!(
        leave.acting_staff_statuses[&first][&Period::P1],
        ApprovalStatus::Pending
    );

    // one coverage notification per covered day
    let inbox = service.notifications(&colleague.id)?;
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().all(|n| n.leave_id == leave.id));
    assert!(inbox.iter().all(|n| n.kind == NotificationKind::Info));

    // sits in the HoD queue, not yet in Administration's
    assert_eq!(service.pending_for_authority(&hod)?.len(), 1);
    assert!(service.pending_for_authority(&principal)?.is_empty());

    let leave = service
        .hod_decide(&leave.id, &hod, Decision::Approved)?
        .expect("leave exists");
    assert_eq!(leave.hod_approval, ApprovalStatus::Approved);
    assert_eq!(leave.status, LeaveStatus::Pending);

    // now Administration sees it
    assert_eq!(service.pending_for_authority(&principal)?.len(), 1);

    let leave = service
        .admin_decide(&leave.id, &principal, Decision::Approved)?
        .expect("leave exists");
    assert_eq!(leave.admin_approval, ApprovalStatus::Approved);
    assert_eq!(leave.status, LeaveStatus::Approved);
    assert_eq!(leave.approver_name.as_deref(), Some(principal.name.as_str()));

    Ok(())
}

#[test]
fn hod_rejection_short_circuits_administration() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("hod_reject.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let hod = seeded(&service, "lingarajmani@sankara.ac.in");
    let principal = seeded(&service, "radhikav@sankara.ac.in");

    let leave = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(date(2024, 4, 1))
            .set_purpose(LeavePurpose::PersonalIssue),
    )?;

    let leave = service
        .hod_decide(&leave.id, &hod, Decision::Rejected)?
        .expect("leave exists");

    assert_eq!(leave.status, LeaveStatus::Rejected);
    assert_eq!(leave.hod_approval, ApprovalStatus::Rejected);
    // the Administration step is skipped entirely
    assert_eq!(leave.admin_approval, ApprovalStatus::Pending);
    assert!(service.pending_for_authority(&principal)?.is_empty());

    Ok(())
}

#[test]
fn delegated_assignment_gates_direct_approval() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("delegation.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let hod = seeded(&service, "lingarajmani@sankara.ac.in");
    let colleague = seeded(&service, "sathyapriya@sankara.ac.in");

    let day = date(2024, 5, 2);
    let leave = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(day)
            .set_purpose(LeavePurpose::ImportantFunction)
            .delegate_to_hod(),
    )?;
    assert!(leave.hod_duty_assignment);
    assert!(leave.acting_staff.is_empty());
    // no colleagues named yet means nothing to notify
    assert!(service.notifications(&colleague.id)?.is_empty());

    // approving before assigning duties is an invalid transition
    let blocked = service.hod_decide(&leave.id, &hod, Decision::Approved);
    assert!(blocked.is_err());
    let unchanged = service.leave(&leave.id)?.unwrap();
    assert_eq!(unchanged.hod_approval, ApprovalStatus::Pending);

    let mut matrix = AssignmentMatrix::new();
    let mut assignment = coverage::empty_day();
    assignment.insert(Period::P3, colleague.name.clone());
    matrix.insert(day, assignment);

    let leave = service
        .hod_assign_duties(&leave.id, &hod, matrix)?
        .expect("leave exists");

    assert!(!leave.hod_duty_assignment);
    assert_eq!(leave.hod_approval, ApprovalStatus::Approved);
    assert_eq!(
        leave.acting_staff_statuses[&day][&Period::P3],
        ApprovalStatus::Pending
    );

    // the delegated dispatch names the HoD
    let inbox = service.notifications(&colleague.id)?;
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].message.contains("(HoD)"));

    // persisted, not just returned
    let reloaded = service.leave(&leave.id)?.unwrap();
    assert_eq!(reloaded, leave);

    Ok(())
}

#[test]
fn duty_response_resolves_every_matching_slot() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("duty_response.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let covering = seeded(&service, "sathyapriya@sankara.ac.in");
    let other = seeded(&service, "hemalatha.cs@sankara.ac.in");

    let first = date(2024, 2, 1);
    let second = date(2024, 2, 2);
    let leave = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(first)
            .set_to_date(second)
            .set_purpose(LeavePurpose::Condolences)
            .assign(first, Period::P2, &covering.name)
            .assign(second, Period::P1, &covering.name)
            .assign(first, Period::P3, &other.name),
    )?;

    // the colleague finds the request by name, case-insensitively
    let acting = service.acting_requests(&covering.name.to_uppercase())?;
    assert_eq!(acting.len(), 1);

    let leave = service
        .respond_to_duty(&leave.id, &covering.name, Decision::Approved)?
        .expect("leave exists");

    assert_eq!(
        leave.acting_staff_statuses[&first][&Period::P2],
        ApprovalStatus::Approved
    );
    assert_eq!(
        leave.acting_staff_statuses[&second][&Period::P1],
        ApprovalStatus::Approved
    );
    // the other colleague's slot is untouched
    assert_eq!(
        leave.acting_staff_statuses[&first][&Period::P3],
        ApprovalStatus::Pending
    );
    // coverage acceptance does not feed the approval chain
    assert_eq!(leave.hod_approval, ApprovalStatus::Pending);
    assert_eq!(leave.status, LeaveStatus::Pending);

    // the requester hears about it once
    let inbox = service.notifications(&requester.id)?;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Success);
    assert!(inbox[0].message.contains(&covering.name));

    // declining is a warning to the requester
    service.respond_to_duty(&leave.id, &other.name, Decision::Rejected)?;
    let inbox = service.notifications(&requester.id)?;
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().any(|n| n.kind == NotificationKind::Warning));

    // read receipts flip in one call
    assert_eq!(service.mark_notifications_read(&requester.id)?, 2);
    assert!(service.notifications(&requester.id)?.iter().all(|n| n.is_read));

    Ok(())
}

#[test]
fn stored_matrices_keep_their_shape() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("round_trip.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let colleague = seeded(&service, "sathyapriya@sankara.ac.in");

    let from = date(2024, 6, 10);
    let to = date(2024, 6, 14); // five days
    let mut draft = LeaveDraft::new()
        .set_from_date(from)
        .set_to_date(to)
        .set_purpose(LeavePurpose::Others);
    draft = draft.assign(from, Period::P1, &colleague.name);

    let leave = service.submit_leave(&requester, draft)?;
    let reloaded = service.leave(&leave.id)?.unwrap();

    assert_eq!(reloaded.acting_staff.len(), 5);
    assert_eq!(reloaded.acting_staff_statuses.len(), 5);
    for day in reloaded.acting_staff.values() {
        assert_eq!(day.len(), Period::ALL.len());
    }
    for day in reloaded.acting_staff_statuses.values() {
        assert_eq!(day.len(), Period::ALL.len());
    }
    assert_eq!(reloaded, leave);

    Ok(())
}

#[test]
fn non_teaching_requests_bypass_the_hod() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("non_teaching.db")?;

    let principal = seeded(&service, "radhikav@sankara.ac.in");
    let hod = seeded(&service, "lingarajmani@sankara.ac.in");

    let mut clerk = seeded(&service, "bharathi@sankara.ac.in");
    clerk.is_teaching_staff = false;
    let clerk = service.save_user(clerk)?;

    let leave = service.submit_leave(
        &clerk,
        LeaveDraft::new()
            .set_from_date(date(2024, 7, 1))
            .set_purpose(LeavePurpose::PersonalIssue),
    )?;

    assert_eq!(leave.hod_approval, ApprovalStatus::NotApplicable);
    assert!(service.pending_for_authority(&hod)?.is_empty());
    assert_eq!(service.pending_for_authority(&principal)?.len(), 1);

    Ok(())
}

#[test]
fn hod_requester_self_approves_the_hod_step() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("hod_self.db")?;

    let hod = seeded(&service, "lingarajmani@sankara.ac.in");
    let principal = seeded(&service, "radhikav@sankara.ac.in");

    let leave = service.submit_leave(
        &hod,
        LeaveDraft::new()
            .set_from_date(date(2024, 8, 1))
            .set_purpose(LeavePurpose::Others),
    )?;

    assert_eq!(leave.hod_approval, ApprovalStatus::Approved);
    // goes straight to Administration, and never back to its author
    assert_eq!(service.pending_for_authority(&principal)?.len(), 1);
    assert!(service.pending_for_authority(&hod)?.is_empty());

    Ok(())
}

#[test]
fn mutations_broadcast_change_events() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("events.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let colleague = seeded(&service, "sathyapriya@sankara.ac.in");
    let receiver = service.subscribe();

    let day = date(2024, 9, 2);
    service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(day)
            .set_purpose(LeavePurpose::Others)
            .assign(day, Period::P1, &colleague.name),
    )?;

    let events: Vec<ChangeEvent> = receiver.try_iter().collect();
    assert!(events.contains(&ChangeEvent::Leaves));
    assert!(events.contains(&ChangeEvent::Notifications));

    Ok(())
}

#[test]
fn registered_hod_retains_approval_authority() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("register_role.db")?;

    // a seeded HoD creating credentials must stay a HoD
    let hod = service.register(
        "lingaraj",
        "lingarajmani@sankara.ac.in",
        "pw",
        "Computer Science",
        Gender::Male,
    )?;
    assert_eq!(hod.role, Role::Hod);
    assert_eq!(hod.name, "Dr.Lingaraj Mani.M");

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let leave = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(date(2024, 12, 2))
            .set_purpose(LeavePurpose::Others),
    )?;

    assert_eq!(service.pending_for_authority(&hod)?.len(), 1);
    let leave = service
        .hod_decide(&leave.id, &hod, Decision::Approved)?
        .expect("leave exists");
    assert_eq!(leave.hod_approval, ApprovalStatus::Approved);

    Ok(())
}

#[test]
fn leave_reads_list_newest_first() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("ordering.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let first = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(date(2024, 11, 4))
            .set_purpose(LeavePurpose::Others),
    )?;
    let second = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(date(2024, 11, 5))
            .set_purpose(LeavePurpose::Others),
    )?;

    let listed = service.leaves()?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);

    let mine = service.leaves_for_user(&requester.id)?;
    assert_eq!(mine[0].id, second.id);

    Ok(())
}

#[test]
fn letter_and_history_round_out_the_request() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("letter_export.db")?;

    let requester = seeded(&service, "bhavya@sankara.ac.in");
    let colleague = seeded(&service, "sathyapriya@sankara.ac.in");

    let day = date(2024, 10, 3);
    let leave = service.submit_leave(
        &requester,
        LeaveDraft::new()
            .set_from_date(day)
            .set_purpose(LeavePurpose::MedicalLeave)
            .set_medical_certificate(true)
            .assign(day, Period::P4, &colleague.name),
    )?;
    assert!(leave.final_letter_content.is_empty());

    let leave = service
        .finalize_letter(&leave.id, &leave_approval::letter::TemplateDrafter)?
        .expect("leave exists");
    assert!(leave.final_letter_content.contains("Medical Leave"));
    assert!(leave.final_letter_content.contains(&requester.name));
    assert!(leave.final_letter_content.contains(&colleague.name));
    // persisted on the record itself
    let reloaded = service.leave(&leave.id)?.unwrap();
    assert_eq!(reloaded.final_letter_content, leave.final_letter_content);

    let csv = service.export_history(&requester.id)?;
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("ID,Purpose,From,To,Type,Status,SubmittedAt"));
    let row = lines.next().expect("one exported row");
    assert!(row.contains("\"Medical Leave\""));
    assert!(row.contains("\"2024-10-03\""));

    // another user's history exports as just the header
    let other = service.export_history(&colleague.id)?;
    assert_eq!(other.lines().count(), 1);

    Ok(())
}

#[test]
fn unknown_leave_ids_are_silent_noops() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("missing.db")?;
    let hod = seeded(&service, "lingarajmani@sankara.ac.in");

    assert!(service.hod_decide("leave_missing", &hod, Decision::Approved)?.is_none());
    assert!(
        service
            .respond_to_duty("leave_missing", "Ms.Bhavya.P", Decision::Approved)?
            .is_none()
    );

    Ok(())
}
