use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStage, Appointment, BlobKey, Challan,
    LoginOtpAttempt, Officer, OfficerAssignment, OfficerProfile, OtpVerification,
    PaymentTransaction, PositionType, UserAccount, UserId,
};

/// Which applications a query may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// Applications authored by one applicant.
    OwnedBy(UserId),
    /// Applications at any of `stages`, optionally limited to one category.
    Stages {
        stages: Vec<ApplicationStage>,
        category: Option<PositionType>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub scope: QueryScope,
    /// Case-insensitive substring of "first last".
    pub applicant_name: Option<String>,
    pub submitted_from: Option<DateTime<Utc>>,
    pub submitted_to: Option<DateTime<Utc>>,
    pub skip: usize,
    pub take: usize,
}

impl ApplicationQuery {
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        let in_scope = match &self.scope {
            QueryScope::OwnedBy(user) => record.is_owned_by(user),
            QueryScope::Stages { stages, category } => {
                stages.contains(&record.stage())
                    && category.map_or(true, |category| category == record.position_type)
            }
        };
        if !in_scope {
            return false;
        }
        if let Some(needle) = self
            .applicant_name
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
        {
            let haystack = record.applicant.full_name().to_lowercase();
            if !haystack.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self
            .submitted_from
            .is_some_and(|from| record.submitted_at < from)
        {
            return false;
        }
        if self.submitted_to.is_some_and(|to| record.submitted_at > to) {
            return false;
        }
        true
    }
}

/// One logical unit of work against the application store.
///
/// Stores apply the whole commit or nothing. The application write only succeeds when the
/// stored version still equals `expected_version`; the stored copy then carries
/// `expected_version + 1`.
#[derive(Debug, Clone)]
pub struct ApplicationCommit {
    pub application: ApplicationRecord,
    pub expected_version: u64,
    /// Must not replace an existing appointment.
    pub appointment: Option<Appointment>,
    pub assignment: Option<OfficerAssignment>,
    /// Signature OTP to mark used; must still be unused.
    pub consumed_otp: Option<(Uuid, DateTime<Utc>)>,
    pub transaction: Option<PaymentTransaction>,
    /// Must not replace a generated challan.
    pub challan: Option<Challan>,
}

impl ApplicationCommit {
    pub fn new(application: ApplicationRecord, expected_version: u64) -> Self {
        Self {
            application,
            expected_version,
            appointment: None,
            assignment: None,
            consumed_otp: None,
            transaction: None,
            challan: None,
        }
    }

    pub fn with_appointment(mut self, appointment: Appointment) -> Self {
        self.appointment = Some(appointment);
        self
    }

    pub fn with_assignment(mut self, assignment: OfficerAssignment) -> Self {
        self.assignment = Some(assignment);
        self
    }

    pub fn consuming_otp(mut self, otp_id: Uuid, at: DateTime<Utc>) -> Self {
        self.consumed_otp = Some((otp_id, at));
        self
    }

    pub fn with_transaction(mut self, transaction: PaymentTransaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn with_challan(mut self, challan: Challan) -> Self {
        self.challan = Some(challan);
        self
    }
}

pub trait ApplicationRepository: Send + Sync {
    /// Next sequence for `year`. Serialized by the store; never reused.
    fn allocate_sequence(&self, year: i32) -> Result<u32, RepositoryError>;
    /// Conflict when the id or application number is already taken.
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Newest submissions first, after `skip`, at most `take`.
    fn query(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn commit(&self, commit: ApplicationCommit) -> Result<ApplicationRecord, RepositoryError>;
    fn appointment(&self, id: &ApplicationId) -> Result<Option<Appointment>, RepositoryError>;
    fn assignments(&self, id: &ApplicationId) -> Result<Vec<OfficerAssignment>, RepositoryError>;
    fn record_signature_otp(&self, otp: OtpVerification) -> Result<(), RepositoryError>;
    fn signature_otps(&self, id: &ApplicationId) -> Result<Vec<OtpVerification>, RepositoryError>;
    fn transaction(&self, id: &ApplicationId)
        -> Result<Option<PaymentTransaction>, RepositoryError>;
    fn challan(&self, id: &ApplicationId) -> Result<Option<Challan>, RepositoryError>;
}

/// Users come from the identity provider; officer rows are created here.
pub trait DirectoryRepository: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
    /// Conflict when the id is taken.
    fn insert_user(&self, account: UserAccount) -> Result<UserAccount, RepositoryError>;
    fn officer_for_user(&self, id: &UserId) -> Result<Option<Officer>, RepositoryError>;
    /// Conflict when the user already has an officer row.
    fn insert_officer(&self, officer: Officer) -> Result<Officer, RepositoryError>;
    fn officers(&self) -> Result<Vec<OfficerProfile>, RepositoryError>;
}

pub trait OtpAttemptRepository: Send + Sync {
    fn find(&self, email: &str) -> Result<Option<LoginOtpAttempt>, RepositoryError>;
    fn save(&self, attempt: LoginOtpAttempt) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound email produced by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

pub trait Notifier: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Blob storage. Keys are unguessable but the store performs no access control.
pub trait DocumentStore: Send + Sync {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<BlobKey, DocumentStoreError>;
    fn read(&self, key: &BlobKey) -> Result<Vec<u8>, DocumentStoreError>;
    /// Removing a missing key is not an error.
    fn delete(&self, key: &BlobKey) -> Result<(), DocumentStoreError>;
}

/// Stored bytes together with the media type they are served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDownload {
    pub media_type: mime::Mime,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    #[error("document {0} does not exist")]
    NotFound(BlobKey),
    #[error("document store failure: {0}")]
    Io(String),
}
