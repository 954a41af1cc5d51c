#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("From Date <= To Date failed")]
    InvalidDateRange,
    #[error("Half Day leave must start and end on the same date")]
    HalfDayRange,
    #[error("email '{0}' is outside the institution domain")]
    WrongEmailDomain(String),
    #[error("an account is already registered for '{0}'")]
    DuplicateEmail(String),
}

#[derive(thiserror::Error, Debug)]
pub enum TransitionError {
    #[error("session coverage was delegated to the HoD; assign duties before approving")]
    DelegationPending,
    #[error("'{0}' is not authorised to perform this approval step")]
    NotAnAuthority(String),
}
