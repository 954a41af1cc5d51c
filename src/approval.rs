//! Approval state machine: the two-tier authority chain over a leave
//! request and the queue visibility rules for each authority role.
use super::coverage;
use super::directory::{Role, User};
use super::error::TransitionError;
use super::leave::{ApprovalStatus, AssignmentMatrix, Decision, LeaveRequest, LeaveStatus};
use super::utils::normalize;

/// HoD step at submission time: a HoD requester self-approves, other
/// teaching staff wait on their HoD, non-teaching staff skip the step.
pub fn initial_hod_approval(requester: &User) -> ApprovalStatus {
    if requester.role == Role::Hod {
        ApprovalStatus::Approved
    } else if requester.is_teaching_staff {
        ApprovalStatus::Pending
    } else {
        ApprovalStatus::NotApplicable
    }
}

fn record_approver(leave: &mut LeaveRequest, authority: &User) {
    // only the most recent actor is retained
    leave.approver_name = Some(authority.name.clone());
    leave.approver_role = Some(authority.role);
}

/// Direct HoD approve/reject. Approving while the coverage assignment is
/// still delegated is an invalid transition; the assignment step has to
/// run first. A rejection short-circuits the aggregate status and the
/// Administration step never sees the request.
pub fn hod_decision(
    leave: &mut LeaveRequest,
    authority: &User,
    decision: Decision,
) -> Result<(), TransitionError> {
    if authority.role != Role::Hod {
        return Err(TransitionError::NotAnAuthority(authority.role.to_string()));
    }
    if leave.hod_duty_assignment && decision == Decision::Approved {
        return Err(TransitionError::DelegationPending);
    }

    leave.hod_approval = decision.as_status();
    if decision == Decision::Rejected {
        leave.status = LeaveStatus::Rejected;
    }
    record_approver(leave, authority);
    Ok(())
}

/// Atomic assignment primitive: overwrite the coverage matrix, regenerate
/// every slot status and clear the delegation flag. Composing this with
/// [`hod_decision`] gives the HoD "assign duties" action; callers needing
/// only the assignment rewrite use it on its own.
pub fn apply_assignment(leave: &mut LeaveRequest, matrix: AssignmentMatrix) {
    let dates: Vec<_> = matrix.keys().copied().collect();
    leave.acting_staff_statuses = coverage::derive_statuses(&dates, &matrix);
    leave.acting_staff = matrix;
    leave.hod_duty_assignment = false;
}

/// Named aggregation policy for the Administration step: its verdict sets
/// the aggregate status unconditionally, even over a prior HoD rejection.
/// The asymmetry is inherited behavior kept deliberate and reviewable
/// here rather than fixed in passing.
pub fn status_after_admin(decision: Decision) -> LeaveStatus {
    match decision {
        Decision::Approved => LeaveStatus::Approved,
        Decision::Rejected => LeaveStatus::Rejected,
    }
}

/// Administration (Principal / Vice Principal) approve/reject.
pub fn admin_decision(
    leave: &mut LeaveRequest,
    authority: &User,
    decision: Decision,
) -> Result<(), TransitionError> {
    if !authority.role.is_admin() {
        return Err(TransitionError::NotAnAuthority(authority.role.to_string()));
    }

    leave.admin_approval = decision.as_status();
    leave.status = status_after_admin(decision);
    record_approver(leave, authority);
    Ok(())
}

/// Whether a request belongs on this authority's dashboard at all. A HoD
/// sees teaching-staff requests from their own department; Administration
/// sees non-teaching requests directly and teaching requests once the HoD
/// has approved. Nobody reviews their own request.
pub fn visible_to_authority(leave: &LeaveRequest, authority: &User) -> bool {
    if leave.user_id == authority.id {
        return false;
    }
    match authority.role {
        Role::Hod => {
            leave.is_teaching_staff
                && normalize(leave.department.as_deref().unwrap_or(""))
                    == normalize(authority.department.as_deref().unwrap_or(""))
        }
        Role::Principal | Role::VicePrincipal => {
            !leave.is_teaching_staff || leave.hod_approval == ApprovalStatus::Approved
        }
        Role::Staff => false,
    }
}

/// Whether the request still awaits this authority's own decision.
pub fn pending_action(leave: &LeaveRequest, authority: &User) -> bool {
    if !visible_to_authority(leave, authority) {
        return false;
    }
    match authority.role {
        Role::Hod => leave.hod_approval == ApprovalStatus::Pending,
        Role::Principal | Role::VicePrincipal => leave.admin_approval == ApprovalStatus::Pending,
        Role::Staff => false,
    }
}
