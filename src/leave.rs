//! Core leave request model and draft builder
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use super::approval;
use super::coverage;
use super::directory::{Role, User};
use super::error::ValidationError;
use super::utils;

/// Sentinel assignment value meaning the session needs no cover.
pub const FREE: &str = "Free";
/// Sentinel assignment value for slots outside the working day.
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum DayType {
    #[n(0)]
    FullDay,
    #[n(1)]
    HalfDay,
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::FullDay => write!(f, "Full Day"),
            DayType::HalfDay => write!(f, "Half Day"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum LeavePurpose {
    #[n(0)]
    Condolences,
    #[n(1)]
    PersonalIssue,
    #[n(2)]
    MedicalLeave,
    #[n(3)]
    ImportantFunction,
    #[n(4)]
    Others,
}

impl fmt::Display for LeavePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LeavePurpose::Condolences => "Condolences",
            LeavePurpose::PersonalIssue => "Personal Issue",
            LeavePurpose::MedicalLeave => "Medical Leave",
            LeavePurpose::ImportantFunction => "Important Function",
            LeavePurpose::Others => "Others",
        };
        write!(f, "{label}")
    }
}

/// Which half of a Half Day leave is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum SessionHalf {
    #[n(0)]
    Morning,
    #[n(1)]
    Afternoon,
}

impl fmt::Display for SessionHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionHalf::Morning => write!(f, "Morning"),
            SessionHalf::Afternoon => write!(f, "Afternoon"),
        }
    }
}

/// One of the six fixed teaching sessions in a working day. Coverage is
/// always recorded for all six slots, whether or not the day uses them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, minicbor::Encode, minicbor::Decode,
)]
#[cbor(index_only)]
pub enum Period {
    #[n(0)]
    P1,
    #[n(1)]
    P2,
    #[n(2)]
    P3,
    #[n(3)]
    P4,
    #[n(4)]
    P5,
    #[n(5)]
    P6,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::P1,
        Period::P2,
        Period::P3,
        Period::P4,
        Period::P5,
        Period::P6,
    ];

    /// Short label used in notification messages, e.g. "P3".
    pub fn label(&self) -> &'static str {
        match self {
            Period::P1 => "P1",
            Period::P2 => "P2",
            Period::P3 => "P3",
            Period::P4 => "P4",
            Period::P5 => "P5",
            Period::P6 => "P6",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match self {
            Period::P1 => "period1",
            Period::P2 => "period2",
            Period::P3 => "period3",
            Period::P4 => "period4",
            Period::P5 => "period5",
            Period::P6 => "period6",
        };
        write!(f, "{slot}")
    }
}

/// Per-authority verdict on a request or on a single coverage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum ApprovalStatus {
    #[n(0)]
    NotApplicable,
    #[n(1)]
    Pending,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::NotApplicable => write!(f, "N/A"),
            ApprovalStatus::Pending => write!(f, "Pending"),
            ApprovalStatus::Approved => write!(f, "Approved"),
            ApprovalStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Aggregate outcome of a request, distinct from the per-authority fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum LeaveStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveStatus::Pending => write!(f, "Pending"),
            LeaveStatus::Approved => write!(f, "Approved"),
            LeaveStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// An approve/reject action taken by an authority or acting colleague.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_status(&self) -> ApprovalStatus {
        match self {
            Decision::Approved => ApprovalStatus::Approved,
            Decision::Rejected => ApprovalStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approved => write!(f, "Approved"),
            Decision::Rejected => write!(f, "Rejected"),
        }
    }
}

const ISO_DATE: &str = "%Y-%m-%d";

/// A single leave calendar day. Encoded on disk as the ISO date string, so
/// lexical key order in the store matches chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeaveDate(pub NaiveDate);

impl LeaveDate {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        let date = NaiveDate::parse_from_str(value.trim(), ISO_DATE)?;
        Ok(LeaveDate(date))
    }
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(LeaveDate)
    }
}

impl fmt::Display for LeaveDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ISO_DATE))
    }
}

impl<C> minicbor::Encode<C> for LeaveDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for LeaveDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let value = d.str()?;

        NaiveDate::parse_from_str(value, ISO_DATE)
            .map(LeaveDate)
            .map_err(|_| minicbor::decode::Error::message("failed to parse calendar date"))
    }
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Comparisons delegate to the inner instant; deriving them would demand
// `T: Ord`, which zone markers like `Utc` do not implement.
impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// date -> session slot -> assigned colleague name (or "Free"/"N/A"/blank)
pub type DayAssignment = BTreeMap<Period, String>;
pub type AssignmentMatrix = BTreeMap<LeaveDate, DayAssignment>;
/// date -> session slot -> approval status of that coverage assignment
pub type DayStatuses = BTreeMap<Period, ApprovalStatus>;
pub type StatusMatrix = BTreeMap<LeaveDate, DayStatuses>;

/// True when the slot value names an actual colleague rather than a sentinel.
pub fn is_real_name(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != FREE && trimmed != NOT_APPLICABLE
}

// key is the leave id, value is this record encoded into cbor
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct LeaveRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub is_teaching_staff: bool,
    #[n(4)]
    pub department: Option<String>,
    #[n(5)]
    pub from_date: LeaveDate,
    #[n(6)]
    pub to_date: LeaveDate,
    #[n(7)]
    pub day_type: DayType,
    #[n(8)]
    pub purpose: LeavePurpose,
    #[n(9)]
    pub acting_staff: AssignmentMatrix,
    #[n(10)]
    pub acting_staff_statuses: StatusMatrix,
    #[n(11)]
    pub has_medical_certificate: bool,
    #[n(12)]
    pub final_letter_content: String,
    #[n(13)]
    pub submitted_at: TimeStamp<Utc>,
    #[n(14)]
    pub time: Option<String>,
    #[n(15)]
    pub sections: Vec<SessionHalf>,
    #[n(16)]
    pub status: LeaveStatus,
    #[n(17)]
    pub hod_approval: ApprovalStatus,
    #[n(18)]
    pub admin_approval: ApprovalStatus,
    #[n(19)]
    pub approver_name: Option<String>,
    #[n(20)]
    pub approver_role: Option<Role>,
    #[n(21)]
    pub hod_duty_assignment: bool,
}

impl LeaveRequest {
    /// Inclusive calendar days covered by this request.
    pub fn leave_dates(&self) -> Vec<LeaveDate> {
        coverage::expand_date_range(self.from_date, self.to_date)
    }

    /// True when the named colleague covers at least one slot of this leave.
    pub fn assigns_to(&self, colleague_name: &str) -> bool {
        let target = utils::normalize(colleague_name);
        self.acting_staff.values().any(|day| {
            day.values()
                .any(|value| is_real_name(value) && utils::normalize(value) == target)
        })
    }
}

// used for constructing drafts, built into a LeaveRequest on submit
#[derive(Debug, Default)]
pub struct LeaveDraft {
    from_date: Option<LeaveDate>,
    to_date: Option<LeaveDate>,
    day_type: Option<DayType>,
    purpose: Option<LeavePurpose>,
    acting_staff: AssignmentMatrix,
    hod_duty_assignment: bool,
    has_medical_certificate: bool,
    letter: String,
    time: Option<String>,
    sections: Vec<SessionHalf>,
}

impl LeaveDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_from_date(mut self, date: LeaveDate) -> Self {
        self.from_date = Some(date);
        self
    }
    pub fn set_to_date(mut self, date: LeaveDate) -> Self {
        self.to_date = Some(date);
        self
    }
    pub fn set_day_type(mut self, day_type: DayType) -> Self {
        self.day_type = Some(day_type);
        self
    }
    pub fn set_purpose(mut self, purpose: LeavePurpose) -> Self {
        self.purpose = Some(purpose);
        self
    }
    pub fn set_acting_staff(mut self, matrix: AssignmentMatrix) -> Self {
        self.acting_staff = matrix;
        self
    }
    pub fn assign(mut self, date: LeaveDate, period: Period, name: &str) -> Self {
        self.acting_staff
            .entry(date)
            .or_insert_with(coverage::empty_day)
            .insert(period, name.to_string());
        self
    }
    /// Defer the coverage assignment to the Department Head.
    pub fn delegate_to_hod(mut self) -> Self {
        self.hod_duty_assignment = true;
        self
    }
    pub fn set_medical_certificate(mut self, attached: bool) -> Self {
        self.has_medical_certificate = attached;
        self
    }
    pub fn set_letter(mut self, content: &str) -> Self {
        self.letter = content.to_string();
        self
    }
    pub fn set_time(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }
    pub fn set_sections(mut self, sections: Vec<SessionHalf>) -> Self {
        self.sections = sections;
        self
    }

    /// Checks required fields and the date range, then constructs the
    /// submitted record with its derived coverage status matrix and
    /// initial approval chain.
    pub fn build(self, requester: &User) -> anyhow::Result<LeaveRequest> {
        let from_date = self
            .from_date
            .ok_or(ValidationError::MissingField("From Date"))?;
        let purpose = self.purpose.ok_or(ValidationError::MissingField("Purpose"))?;
        let day_type = self.day_type.unwrap_or(DayType::FullDay);

        // Half Day ranges collapse onto the single from-date.
        let to_date = match day_type {
            DayType::HalfDay => {
                if self.to_date.is_some_and(|to| to != from_date) {
                    return Err(ValidationError::HalfDayRange.into());
                }
                from_date
            }
            DayType::FullDay => self.to_date.unwrap_or(from_date),
        };
        if to_date < from_date {
            return Err(ValidationError::InvalidDateRange.into());
        }

        let dates = coverage::expand_date_range(from_date, to_date);

        let acting_staff = if self.hod_duty_assignment {
            AssignmentMatrix::new()
        } else {
            let mut matrix = self.acting_staff;
            coverage::sync_assignments(&mut matrix, &dates);
            matrix
        };
        let acting_staff_statuses = coverage::derive_statuses(&dates, &acting_staff);

        Ok(LeaveRequest {
            id: utils::new_uuid_to_bech32("leave")?,
            user_id: requester.id.clone(),
            name: requester.name.clone(),
            is_teaching_staff: requester.is_teaching_staff,
            department: requester.department.clone(),
            from_date,
            to_date,
            day_type,
            purpose,
            acting_staff,
            acting_staff_statuses,
            has_medical_certificate: self.has_medical_certificate,
            final_letter_content: self.letter,
            submitted_at: TimeStamp::new(),
            time: match day_type {
                DayType::HalfDay => self.time,
                DayType::FullDay => None,
            },
            sections: match day_type {
                DayType::HalfDay => self.sections,
                DayType::FullDay => vec![],
            },
            status: LeaveStatus::Pending,
            hod_approval: approval::initial_hod_approval(requester),
            admin_approval: ApprovalStatus::Pending,
            approver_name: None,
            approver_role: None,
            hod_duty_assignment: self.hod_duty_assignment,
        })
    }
}
