//! Coverage assignment engine: the per-date, per-session matrix of acting
//! colleagues and the approval status derived for every slot.
use std::collections::BTreeMap;

use super::directory::{Role, User};
use super::leave::{
    ApprovalStatus, AssignmentMatrix, DayAssignment, DayStatuses, LeaveDate, Period, StatusMatrix,
    is_real_name,
};
use super::utils::normalize;

/// Inclusive day-by-day expansion of a calendar range. A reversed range
/// expands to nothing; a single-day range to exactly that day.
pub fn expand_date_range(from: LeaveDate, to: LeaveDate) -> Vec<LeaveDate> {
    let mut dates = Vec::new();
    let mut current = from.0;
    while current <= to.0 {
        dates.push(LeaveDate(current));
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// A day with all six session slots unassigned.
pub fn empty_day() -> DayAssignment {
    Period::ALL.iter().map(|p| (*p, String::new())).collect()
}

/// For every date and every one of the six fixed slots: "N/A" unless the
/// slot names a real colleague, in which case the assignment starts out
/// "Pending" their acceptance. Runs at submission and again whenever the
/// HoD overwrites assignments during delegated approval.
pub fn derive_statuses(dates: &[LeaveDate], matrix: &AssignmentMatrix) -> StatusMatrix {
    let mut statuses = StatusMatrix::new();
    for date in dates {
        let mut day: DayStatuses = Period::ALL
            .iter()
            .map(|p| (*p, ApprovalStatus::NotApplicable))
            .collect();
        if let Some(assignment) = matrix.get(date) {
            for (period, value) in assignment {
                if is_real_name(value) {
                    day.insert(*period, ApprovalStatus::Pending);
                }
            }
        }
        statuses.insert(*date, day);
    }
    statuses
}

/// Resync an assignment matrix after the date range changed: added dates
/// get a blank six-slot day, removed dates drop their assignments.
pub fn sync_assignments(matrix: &mut AssignmentMatrix, dates: &[LeaveDate]) {
    for date in dates {
        matrix.entry(*date).or_insert_with(empty_day);
    }
    matrix.retain(|date, _| dates.contains(date));
}

/// Bulk fill: every date takes a copy of the source date's assignment.
/// Pure; the input matrix is left untouched.
pub fn copy_to_all_dates(
    source: LeaveDate,
    matrix: &AssignmentMatrix,
    dates: &[LeaveDate],
) -> AssignmentMatrix {
    let template = matrix.get(&source).cloned().unwrap_or_else(empty_day);
    dates.iter().map(|date| (*date, template.clone())).collect()
}

/// Colleagues selectable to cover for a requester: their department's
/// roster minus the requester themselves, de-duplicated by email, HoD
/// listed first then alphabetical.
pub fn candidates(staff: Vec<User>, requester_email: &str) -> Vec<User> {
    let requester = normalize(requester_email);
    let mut unique: BTreeMap<String, User> = BTreeMap::new();
    for member in staff {
        let key = normalize(&member.email);
        if key != requester {
            unique.insert(key, member);
        }
    }
    let mut list: Vec<User> = unique.into_values().collect();
    list.sort_by(|a, b| match (a.role, b.role) {
        (Role::Hod, Role::Hod) => a.name.cmp(&b.name),
        (Role::Hod, _) => std::cmp::Ordering::Less,
        (_, Role::Hod) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
    list
}
