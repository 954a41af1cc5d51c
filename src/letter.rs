//! Letter drafting collaborator: an external text-generation seam with a
//! deterministic local template behind it. Drafting never fails upward.
use super::leave::{
    AssignmentMatrix, DayType, LeaveDate, LeavePurpose, SessionHalf, is_real_name,
};

/// Normalized request fields handed to the drafting collaborator.
#[derive(Debug, Clone)]
pub struct LetterInput {
    pub name: String,
    pub is_teaching_staff: bool,
    pub department: Option<String>,
    pub duration: String,
    pub day_type: DayType,
    pub purpose: LeavePurpose,
    pub coverage_summary: String,
}

impl LetterInput {
    /// Normalize an existing request into drafting input.
    pub fn from_leave(leave: &crate::leave::LeaveRequest) -> Self {
        let dates = leave.leave_dates();
        LetterInput {
            name: leave.name.clone(),
            is_teaching_staff: leave.is_teaching_staff,
            department: leave.department.clone(),
            duration: duration_description(
                leave.from_date,
                leave.to_date,
                leave.day_type,
                leave.time.as_deref(),
                &leave.sections,
            ),
            day_type: leave.day_type,
            purpose: leave.purpose,
            coverage_summary: coverage_summary(
                leave.hod_duty_assignment,
                &dates,
                &leave.acting_staff,
            ),
        }
    }
}

/// Seam for the external drafting call. Implementations may fail; callers
/// go through [`draft_letter`], which substitutes the local template.
pub trait LetterDrafter {
    fn draft(&self, input: &LetterInput) -> anyhow::Result<String>;
}

/// The built-in drafter: just the deterministic template.
pub struct TemplateDrafter;

impl LetterDrafter for TemplateDrafter {
    fn draft(&self, input: &LetterInput) -> anyhow::Result<String> {
        Ok(fallback_template(input))
    }
}

/// Draft through the collaborator, falling back to the local template on
/// any failure or empty response so the caller is never blocked.
pub fn draft_letter(drafter: &dyn LetterDrafter, input: &LetterInput) -> String {
    match drafter.draft(input) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => fallback_template(input),
        Err(err) => {
            log::warn!("letter drafting collaborator failed: {err:#}; using local template");
            fallback_template(input)
        }
    }
}

/// Human-readable duration line: the full range, or for Half Day the
/// single date with its time and session halves.
pub fn duration_description(
    from: LeaveDate,
    to: LeaveDate,
    day_type: DayType,
    time: Option<&str>,
    sections: &[SessionHalf],
) -> String {
    match day_type {
        DayType::FullDay => format!("{from} to {to}"),
        DayType::HalfDay => {
            let mut out = from.to_string();
            if let Some(time) = time {
                out.push_str(&format!(" at {time}"));
            }
            if !sections.is_empty() {
                let halves: Vec<String> = sections.iter().map(|s| s.to_string()).collect();
                out.push_str(&format!(" ({})", halves.join(" & ")));
            }
            out
        }
    }
}

/// One-line summary of who covers what, per date, for the letter body.
pub fn coverage_summary(
    delegated: bool,
    dates: &[LeaveDate],
    matrix: &AssignmentMatrix,
) -> String {
    if delegated {
        return "Acting staff assignment requested to be handled by the Head of Department."
            .to_string();
    }
    let lines: Vec<String> = dates
        .iter()
        .map(|date| {
            let slots: Vec<String> = matrix
                .get(date)
                .map(|day| {
                    day.iter()
                        .filter(|(_, name)| is_real_name(name))
                        .map(|(period, name)| format!("{}: {name}", period.label()))
                        .collect()
                })
                .unwrap_or_default();
            if slots.is_empty() {
                format!("{date}: Free")
            } else {
                format!("{date}: {}", slots.join(", "))
            }
        })
        .collect();
    if lines.is_empty() {
        "None (Class Free)".to_string()
    } else {
        lines.join("; ")
    }
}

/// Deterministic local template, used whenever the collaborator is
/// unavailable or errors out.
pub fn fallback_template(input: &LetterInput) -> String {
    let certificate_line = if input.purpose == LeavePurpose::MedicalLeave {
        "I have attached my medical certificate for your reference.\n"
    } else {
        ""
    };
    let department_line = match &input.department {
        Some(department) => format!("Department: {department}"),
        None => String::new(),
    };
    let category = if input.is_teaching_staff {
        "Teaching Staff"
    } else {
        "Non-Teaching Staff"
    };

    format!(
        "To The Authority,\n\n\
         Subject: Leave Application for {purpose}\n\n\
         Respected Sir/Madam,\n\n\
         I am writing to request a {day_type} leave for {duration}.\n\
         The reason for this request is: {purpose}.\n\n\
         I have arranged for {coverage} to handle my responsibilities during my absence.\n\
         {certificate_line}\n\
         I kindly request you to approve my leave.\n\n\
         Sincerely,\n\
         {name}\n\
         {category}\n\
         {department_line}",
        purpose = input.purpose,
        day_type = input.day_type.to_string().to_lowercase(),
        duration = input.duration,
        coverage = input.coverage_summary,
        name = input.name,
    )
}
