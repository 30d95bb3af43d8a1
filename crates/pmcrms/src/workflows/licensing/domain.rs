use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transitions::Transition;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ApplicationId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Identity issued by the authentication layer; shared by applicants and officers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfficerId(pub Uuid);

impl fmt::Display for OfficerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque key handed out by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(pub String);

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human readable number in the form `PMC_APPLICATION_<year>_<sequence>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ApplicationNumber {
    pub year: i32,
    pub sequence: u32,
}

const APPLICATION_NUMBER_PREFIX: &str = "PMC_APPLICATION_";

impl fmt::Display for ApplicationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{APPLICATION_NUMBER_PREFIX}{}_{}",
            self.year, self.sequence
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a PMC_APPLICATION_<year>_<sequence> number")]
pub struct ApplicationNumberError(String);

impl FromStr for ApplicationNumber {
    type Err = ApplicationNumberError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ApplicationNumberError(value.to_string());
        let rest = value
            .strip_prefix(APPLICATION_NUMBER_PREFIX)
            .ok_or_else(invalid)?;
        let (year, sequence) = rest.split_once('_').ok_or_else(invalid)?;
        Ok(Self {
            year: year.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

impl From<ApplicationNumber> for String {
    fn from(value: ApplicationNumber) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ApplicationNumber {
    type Error = ApplicationNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Workflow position of an application within the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStage {
    JuniorEngineerPending,
    DocumentVerificationPending,
    AssistantEngineerPending,
    ExecutiveEngineerPending,
    CityEngineerPending,
    PaymentPending,
    ClerkPending,
    ExecutiveEngineerSignPending,
    CityEngineerSignPending,
    Approved,
    Rejected,
}

impl ApplicationStage {
    pub const ALL: [ApplicationStage; 11] = [
        ApplicationStage::JuniorEngineerPending,
        ApplicationStage::DocumentVerificationPending,
        ApplicationStage::AssistantEngineerPending,
        ApplicationStage::ExecutiveEngineerPending,
        ApplicationStage::CityEngineerPending,
        ApplicationStage::PaymentPending,
        ApplicationStage::ClerkPending,
        ApplicationStage::ExecutiveEngineerSignPending,
        ApplicationStage::CityEngineerSignPending,
        ApplicationStage::Approved,
        ApplicationStage::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStage::JuniorEngineerPending => "JUNIOR_ENGINEER_PENDING",
            ApplicationStage::DocumentVerificationPending => "DOCUMENT_VERIFICATION_PENDING",
            ApplicationStage::AssistantEngineerPending => "ASSISTANT_ENGINEER_PENDING",
            ApplicationStage::ExecutiveEngineerPending => "EXECUTIVE_ENGINEER_PENDING",
            ApplicationStage::CityEngineerPending => "CITY_ENGINEER_PENDING",
            ApplicationStage::PaymentPending => "PAYMENT_PENDING",
            ApplicationStage::ClerkPending => "CLERK_PENDING",
            ApplicationStage::ExecutiveEngineerSignPending => "EXECUTIVE_ENGINEER_SIGN_PENDING",
            ApplicationStage::CityEngineerSignPending => "CITY_ENGINEER_SIGN_PENDING",
            ApplicationStage::Approved => "APPROVED",
            ApplicationStage::Rejected => "REJECTED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStage::Approved | ApplicationStage::Rejected)
    }

    /// Display status denormalized from the stage. There is no other way to set a status.
    pub const fn status(self) -> ApplicationStatus {
        match self {
            ApplicationStage::JuniorEngineerPending => ApplicationStatus::Submitted,
            ApplicationStage::DocumentVerificationPending => {
                ApplicationStatus::AppointmentScheduled
            }
            ApplicationStage::AssistantEngineerPending => ApplicationStatus::JuniorEngineerApproved,
            ApplicationStage::ExecutiveEngineerPending => {
                ApplicationStatus::AssistantEngineerApproved
            }
            ApplicationStage::CityEngineerPending => ApplicationStatus::ExecutiveEngineerApproved,
            ApplicationStage::PaymentPending => ApplicationStatus::PaymentPending,
            ApplicationStage::ClerkPending => ApplicationStatus::PaymentCompleted,
            ApplicationStage::ExecutiveEngineerSignPending => ApplicationStatus::ClerkApproved,
            ApplicationStage::CityEngineerSignPending => {
                ApplicationStatus::DigitallySignedByExecutive
            }
            ApplicationStage::Approved => ApplicationStatus::Completed,
            ApplicationStage::Rejected => ApplicationStatus::Rejected,
        }
    }
}

impl fmt::Display for ApplicationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application stage '{0}'")]
pub struct UnknownStage(String);

impl FromStr for ApplicationStage {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        ApplicationStage::ALL
            .into_iter()
            .find(|stage| stage.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStage(value.to_string()))
    }
}

/// Display-oriented label derived from [`ApplicationStage::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    DocumentVerificationPending,
    DocumentVerified,
    AppointmentScheduled,
    AppointmentCompleted,
    JuniorEngineerApproved,
    AssistantEngineerApproved,
    ExecutiveEngineerApproved,
    CityEngineerApproved,
    PaymentPending,
    PaymentCompleted,
    ClerkApproved,
    DigitallySignedByExecutive,
    DigitallySignedByCity,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::DocumentVerificationPending => "document_verification_pending",
            ApplicationStatus::DocumentVerified => "document_verified",
            ApplicationStatus::AppointmentScheduled => "appointment_scheduled",
            ApplicationStatus::AppointmentCompleted => "appointment_completed",
            ApplicationStatus::JuniorEngineerApproved => "junior_engineer_approved",
            ApplicationStatus::AssistantEngineerApproved => "assistant_engineer_approved",
            ApplicationStatus::ExecutiveEngineerApproved => "executive_engineer_approved",
            ApplicationStatus::CityEngineerApproved => "city_engineer_approved",
            ApplicationStatus::PaymentPending => "payment_pending",
            ApplicationStatus::PaymentCompleted => "payment_completed",
            ApplicationStatus::ClerkApproved => "clerk_approved",
            ApplicationStatus::DigitallySignedByExecutive => "digitally_signed_by_executive",
            ApplicationStatus::DigitallySignedByCity => "digitally_signed_by_city",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// Professional discipline an applicant is licensed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionType {
    Architect,
    StructuralEngineer,
    LicenceEngineer,
    Supervisor1,
    Supervisor2,
}

impl PositionType {
    pub const ALL: [PositionType; 5] = [
        PositionType::Architect,
        PositionType::StructuralEngineer,
        PositionType::LicenceEngineer,
        PositionType::Supervisor1,
        PositionType::Supervisor2,
    ];

    /// Name as it appears in role strings such as `JuniorStructuralEngineer`.
    pub const fn as_str(self) -> &'static str {
        match self {
            PositionType::Architect => "Architect",
            PositionType::StructuralEngineer => "StructuralEngineer",
            PositionType::LicenceEngineer => "LicenceEngineer",
            PositionType::Supervisor1 => "Supervisor1",
            PositionType::Supervisor2 => "Supervisor2",
        }
    }
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub address_line3: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pin_code: String,
}

impl Address {
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.address_line1.as_str()];
        parts.extend(self.address_line2.as_deref());
        parts.extend(self.address_line3.as_deref());
        parts.extend([
            self.city.as_str(),
            self.state.as_str(),
            self.pin_code.as_str(),
            self.country.as_str(),
        ]);
        parts
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    AddressProof,
    PanCard,
    AadhaarCard,
    QualificationCertificate,
    QualificationLastYearMarksheet,
    ExperienceCertificate,
    AdditionalDocument,
    SelfDeclarationForm,
    ProfilePicture,
    PropertyDocument,
    CoaDocument,
    ArchitecturalPlan,
    StructuralPlan,
    Noc,
    RecommendedForm,
    Certificate,
    Challan,
    Other,
}

impl DocumentType {
    pub const fn belongs_to_qualification(self) -> bool {
        matches!(
            self,
            DocumentType::QualificationCertificate | DocumentType::QualificationLastYearMarksheet
        )
    }

    pub const fn belongs_to_experience(self) -> bool {
        matches!(self, DocumentType::ExperienceCertificate)
    }
}

/// Qualification line submitted with the form; `file_id` links uploaded certificates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationForm {
    pub file_id: String,
    pub institute_name: String,
    pub university_name: String,
    pub degree_name: String,
    pub passing_month: u8,
    pub year_of_passing: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceForm {
    pub file_id: String,
    pub company_name: String,
    pub position: String,
    pub years_of_experience: u8,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Reference to a file the applicant already uploaded to the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    pub storage_key: BlobKey,
    #[serde(default)]
    pub file_id: Option<String>,
}

/// Applicant supplied form data for a new licence application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub mother_name: Option<String>,
    pub mobile_number: String,
    pub email_address: String,
    pub position_type: PositionType,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f32>,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub permanent_address: Address,
    pub current_address: Address,
    #[serde(default)]
    pub pan_card_number: Option<String>,
    #[serde(default)]
    pub aadhar_card_number: Option<String>,
    #[serde(default)]
    pub coa_card_number: Option<String>,
    #[serde(default)]
    pub qualifications: Vec<QualificationForm>,
    #[serde(default)]
    pub experiences: Vec<ExperienceForm>,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

/// Personal details copied from the form at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub mother_name: Option<String>,
    pub mobile_number: String,
    pub email_address: String,
    pub blood_group: Option<String>,
    pub height_cm: Option<f32>,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub pan_card_number: Option<String>,
    pub aadhar_card_number: Option<String>,
    pub coa_card_number: Option<String>,
}

impl ApplicantDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub id: Uuid,
    pub institute_name: String,
    pub university_name: String,
    pub degree_name: String,
    pub passing_month: u8,
    pub year_of_passing: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    pub company_name: String,
    pub position: String,
    pub years_of_experience: u8,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: Uuid,
    pub document_type: DocumentType,
    pub file_name: String,
    pub storage_key: BlobKey,
    pub qualification_id: Option<Uuid>,
    pub experience_id: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
    pub is_verified: bool,
}

/// Signature bookkeeping for the recommended form; records the first signer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureState {
    pub is_digitally_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by: Option<UserId>,
}

/// Mutable workflow portion of the aggregate. The stage is private: it only moves through
/// a [`Transition`] produced by the transition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    stage: ApplicationStage,
    pub approval_date: Option<DateTime<Utc>>,
    pub is_payment_complete: bool,
    pub is_certificate_generated: bool,
    pub is_challan_generated: bool,
    pub recommended_form: Option<BlobKey>,
    pub certificate_path: Option<BlobKey>,
    pub certificate_number: Option<String>,
    pub certificate_generated_at: Option<DateTime<Utc>>,
    pub certificate_generated_by: Option<UserId>,
    pub challan_path: Option<BlobKey>,
    pub signature: SignatureState,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub last_modified_by: Option<UserId>,
}

impl WorkflowState {
    pub(crate) fn submitted() -> Self {
        Self {
            stage: ApplicationStage::JuniorEngineerPending,
            approval_date: None,
            is_payment_complete: false,
            is_certificate_generated: false,
            is_challan_generated: false,
            recommended_form: None,
            certificate_path: None,
            certificate_number: None,
            certificate_generated_at: None,
            certificate_generated_by: None,
            challan_path: None,
            signature: SignatureState::default(),
            last_modified_at: None,
            last_modified_by: None,
        }
    }

    pub fn stage(&self) -> ApplicationStage {
        self.stage
    }
}

/// Aggregate root of the licensing workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub number: ApplicationNumber,
    pub applicant_id: UserId,
    pub applicant: ApplicantDetails,
    pub position_type: PositionType,
    pub permanent_address: Address,
    pub current_address: Address,
    pub qualifications: Vec<Qualification>,
    pub experiences: Vec<Experience>,
    pub documents: Vec<ApplicationDocument>,
    pub submitted_at: DateTime<Utc>,
    pub workflow: WorkflowState,
    /// Optimistic concurrency token, bumped by every committed write.
    pub version: u64,
}

impl ApplicationRecord {
    pub fn stage(&self) -> ApplicationStage {
        self.workflow.stage
    }

    pub fn status(&self) -> ApplicationStatus {
        self.workflow.stage.status()
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.applicant_id == user
    }

    /// Move the aggregate along a validated edge and stamp the audit columns.
    pub fn apply(&mut self, transition: Transition, at: DateTime<Utc>, by: &UserId) {
        debug_assert_eq!(transition.from(), self.workflow.stage);
        self.workflow.stage = transition.to();
        if transition.to() == ApplicationStage::Approved {
            self.workflow.approval_date = Some(at);
        }
        self.touch(at, by);
    }

    pub fn touch(&mut self, at: DateTime<Utc>, by: &UserId) {
        self.workflow.last_modified_at = Some(at);
        self.workflow.last_modified_by = Some(by.clone());
    }

    #[cfg(test)]
    pub(crate) fn force_stage(&mut self, stage: ApplicationStage) {
        self.workflow.stage = stage;
    }
}

/// A user account as issued by the identity provider. `role` is the raw role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    pub id: OfficerId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    /// Routes signing requests to this officer's key inside the signing HSM.
    pub key_label: String,
    pub created_at: DateTime<Utc>,
}

/// Officer row joined with the owning account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficerProfile {
    pub officer: Officer,
    pub account: UserAccount,
}

/// Append-only audit of who acted on which stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerAssignment {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub officer_id: OfficerId,
    pub stage: ApplicationStage,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub is_digitally_signed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
}

/// Details an officer supplies when scheduling document verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub review_date: DateTime<Utc>,
    #[serde(default)]
    pub comments: Option<String>,
    pub contact_person: String,
    pub place: String,
    pub room_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub scheduled_for: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub comments: Option<String>,
    pub contact_person: String,
    pub place: String,
    pub room_number: String,
    pub scheduled_by: OfficerId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpPurpose {
    DigitalSignature,
    Login,
}

/// Challenge issued for a signing attempt. The OTP value lives only in the signing
/// service; this row tracks expiry and single use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpVerification {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl OtpVerification {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && now < self.expires_at
    }
}

/// Per-email login OTP throttle row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOtpAttempt {
    pub email: String,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    pub retry_count: u32,
    pub generated_at: DateTime<Utc>,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// Round trip with the payment gateway, one per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub order_id: String,
    pub application_id: ApplicationId,
    pub status: TransactionStatus,
    pub price: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub gateway_status: Option<String>,
    pub error_message: Option<String>,
    pub card_type: Option<String>,
    pub mode: Option<String>,
    pub amount_paid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generated payment receipt, at most one per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challan {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub challan_number: String,
    pub name: String,
    pub position: String,
    pub amount: u64,
    pub amount_in_words: String,
    pub challan_date: DateTime<Utc>,
    pub mobile_number: String,
    pub address: String,
    pub file: BlobKey,
    pub is_generated: bool,
}
