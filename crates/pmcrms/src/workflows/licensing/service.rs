use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::access::{self, AccessDenied};
use super::clock::Clock;
use super::domain::{
    ApplicantDetails, ApplicationDocument, ApplicationForm, ApplicationId, ApplicationNumber,
    ApplicationRecord, ApplicationStage, Appointment, AppointmentDetails, AppointmentStatus,
    BlobKey, Experience, Officer, OfficerAssignment, OfficerId, OfficerProfile, Qualification,
    UserAccount, UserId, WorkflowState,
};
use super::notifications;
use super::repository::{
    ApplicationCommit, ApplicationQuery, ApplicationRepository, DirectoryRepository,
    DocumentStore, DocumentStoreError, EmailMessage, Notifier, QueryScope, RepositoryError,
};
use super::roles::{OfficerLevel, RoleClass};
use super::transitions::{self, Actor, TransitionError, TransitionRefusal, TransitionTrigger};
use super::views::{ApplicationDetail, ApplicationPage, ApplicationSummary, ListFilter};

/// Attempts at claiming an application number before giving up.
const NUMBER_ALLOCATION_ATTEMPTS: usize = 5;

/// Shared collaborators for every licensing service.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub applications: Arc<dyn ApplicationRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub documents: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
}

/// Officer resolved from a caller identity.
#[derive(Debug, Clone)]
pub(crate) struct ActingOfficer {
    pub officer: Officer,
    pub account: UserAccount,
    pub role: RoleClass,
}

impl WorkflowDeps {
    pub(crate) fn load(&self, id: &ApplicationId) -> Result<ApplicationRecord, WorkflowError> {
        self.applications
            .fetch(id)?
            .ok_or_else(|| WorkflowError::not_found("application", id))
    }

    pub(crate) fn caller(&self, user: &UserId) -> Result<UserAccount, WorkflowError> {
        self.directory
            .user(user)?
            .ok_or_else(|| WorkflowError::Unauthorized(format!("unknown user {user}")))
    }

    pub(crate) fn acting_officer(&self, user: &UserId) -> Result<ActingOfficer, WorkflowError> {
        let account = self.caller(user)?;
        let officer = self
            .directory
            .officer_for_user(user)?
            .ok_or_else(|| WorkflowError::Unauthorized(format!("no officer profile for {user}")))?;
        let role = RoleClass::classify(&account.role);
        Ok(ActingOfficer {
            officer,
            account,
            role,
        })
    }

    /// Officers whose level owns `stage` and who may act on `record`'s category there.
    pub(crate) fn officers_for_stage(
        &self,
        record: &ApplicationRecord,
        stage: ApplicationStage,
    ) -> Result<Vec<OfficerProfile>, WorkflowError> {
        let officers = self.directory.officers()?;
        Ok(officers
            .into_iter()
            .filter(|profile| {
                let role = RoleClass::classify(&profile.account.role);
                access::can_view(&role, stage, record.position_type)
            })
            .collect())
    }

    /// Commit a record that points at the freshly saved `blob`. A failed commit removes the
    /// blob again so nothing in the store is left unreferenced.
    pub(crate) fn commit_with_blob(
        &self,
        commit: ApplicationCommit,
        blob: &BlobKey,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let committed = self.applications.commit(commit);
        if let Err(failure) = &committed {
            warn!(%blob, error = %failure, "commit failed; discarding stored document");
            if let Err(error) = self.documents.delete(blob) {
                warn!(%blob, %error, "orphaned document could not be removed");
            }
        }
        committed
    }

    /// Delivery failures are logged and never fail the calling operation.
    pub(crate) fn notify(&self, message: EmailMessage) {
        if let Err(error) = self.notifier.send(&message) {
            warn!(
                to = %message.to,
                subject = %message.subject,
                error = %error,
                "notification delivery failed"
            );
        }
    }
}

/// Orchestrates licence applications from submission through officer review.
pub struct LicenceApplicationService {
    deps: WorkflowDeps,
}

impl LicenceApplicationService {
    pub fn new(deps: WorkflowDeps) -> Self {
        Self { deps }
    }

    pub fn deps(&self) -> &WorkflowDeps {
        &self.deps
    }

    /// Submit a new application for `applicant`, starting at JUNIOR_ENGINEER_PENDING.
    pub fn create_application(
        &self,
        form: ApplicationForm,
        applicant: &UserId,
    ) -> Result<ApplicationRecord, WorkflowError> {
        self.deps
            .directory
            .user(applicant)?
            .ok_or_else(|| WorkflowError::not_found("user", applicant))?;
        validate_form(&form)?;

        let now = self.deps.clock.now();
        let year = now.year();
        let draft = build_record(form, applicant, now);

        for attempt in 1..=NUMBER_ALLOCATION_ATTEMPTS {
            let sequence = self.deps.applications.allocate_sequence(year)?;
            let mut record = draft.clone();
            record.number = ApplicationNumber { year, sequence };
            match self.deps.applications.insert(record) {
                Ok(stored) => {
                    info!(
                        application = %stored.id,
                        number = %stored.number,
                        category = %stored.position_type,
                        "application submitted"
                    );
                    return Ok(stored);
                }
                Err(RepositoryError::Conflict(reason)) => {
                    warn!(attempt, year, sequence, %reason, "application number taken, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(WorkflowError::Conflict(format!(
            "could not allocate an application number for {year}"
        )))
    }

    /// Applications visible to `user`: by stage and category for officers, authored ones otherwise.
    pub fn list_applications(
        &self,
        user: &UserId,
        filter: &ListFilter,
    ) -> Result<ApplicationPage, WorkflowError> {
        let account = self.deps.caller(user)?;
        let role = RoleClass::classify(&account.role);
        let scope = if role.is_officer() {
            let category = match role.level {
                OfficerLevel::Junior | OfficerLevel::Assistant => {
                    role.category
                }
                _ => None,
            };
            QueryScope::Stages {
                stages: access::owned_stages(role.level).to_vec(),
                category,
            }
        } else {
            QueryScope::OwnedBy(user.clone())
        };

        let query = ApplicationQuery {
            scope,
            applicant_name: filter.applicant_name.clone(),
            submitted_from: filter.from,
            submitted_to: filter.to,
            skip: filter.skip(),
            take: filter.page_size(),
        };
        let items = self
            .deps
            .applications
            .query(&query)?
            .iter()
            .map(ApplicationSummary::from)
            .collect();
        Ok(ApplicationPage {
            page: filter.page(),
            page_size: filter.page_size(),
            items,
        })
    }

    /// Full detail for the owning applicant or an officer who may view the current stage.
    pub fn get_application(
        &self,
        id: &ApplicationId,
        user: &UserId,
    ) -> Result<ApplicationDetail, WorkflowError> {
        let record = self.deps.load(id)?;
        if !record.is_owned_by(user) {
            let account = self.deps.caller(user)?;
            let role = RoleClass::classify(&account.role);
            access::authorize(&role, record.stage(), record.position_type)?;
        }
        let appointment = self.deps.applications.appointment(id)?;
        let assignments = self.deps.applications.assignments(id)?;
        Ok(ApplicationDetail::new(record, appointment, assignments))
    }

    /// Officer-initiated move along the officer-decision edges.
    pub fn update_stage(
        &self,
        id: &ApplicationId,
        new_stage: ApplicationStage,
        officer_user: &UserId,
        comments: Option<String>,
    ) -> Result<ApplicationRecord, WorkflowError> {
        let mut record = self.deps.load(id)?;
        let acting = self.deps.acting_officer(officer_user)?;
        let previous = record.stage();
        let transition = transitions::plan(
            previous,
            new_stage,
            TransitionTrigger::OfficerDecision,
            &Actor::Officer(acting.role),
            record.position_type,
        )?;

        let now = self.deps.clock.now();
        let expected = record.version;
        record.apply(transition, now, officer_user);
        let assignment = OfficerAssignment {
            id: Uuid::new_v4(),
            application_id: record.id,
            officer_id: acting.officer.id,
            stage: previous,
            assigned_at: now,
            completed_at: Some(now),
            comments: comments.clone(),
            is_digitally_signed: false,
        };
        let stored = self
            .deps
            .applications
            .commit(ApplicationCommit::new(record, expected).with_assignment(assignment))?;

        info!(
            application = %stored.id,
            from = %previous,
            to = %stored.stage(),
            officer = %acting.officer.id,
            "application stage updated"
        );
        self.deps.notify(notifications::stage_update_email(
            &stored,
            previous,
            acting.role.display_name(),
            comments.as_deref(),
        ));
        Ok(stored)
    }

    /// Create the appointment and move to DOCUMENT_VERIFICATION_PENDING in one commit.
    pub fn schedule_appointment(
        &self,
        id: &ApplicationId,
        details: AppointmentDetails,
        officer_user: &UserId,
    ) -> Result<Appointment, WorkflowError> {
        let mut record = self.deps.load(id)?;
        let previous = record.stage();
        if previous != ApplicationStage::JuniorEngineerPending {
            return Err(TransitionError::Illegal {
                from: previous,
                to: ApplicationStage::DocumentVerificationPending,
                trigger: TransitionTrigger::AppointmentScheduling,
            }
            .into());
        }
        let acting = self.deps.acting_officer(officer_user)?;
        let transition = transitions::plan(
            previous,
            ApplicationStage::DocumentVerificationPending,
            TransitionTrigger::AppointmentScheduling,
            &Actor::Officer(acting.role),
            record.position_type,
        )?;
        for (field, value) in [
            ("contact_person", &details.contact_person),
            ("place", &details.place),
            ("room_number", &details.room_number),
        ] {
            if value.trim().is_empty() {
                return Err(WorkflowError::Validation(format!("{field} is required")));
            }
        }

        let now = self.deps.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            application_id: record.id,
            scheduled_for: details.review_date,
            status: AppointmentStatus::Scheduled,
            comments: details.comments,
            contact_person: details.contact_person,
            place: details.place,
            room_number: details.room_number,
            scheduled_by: acting.officer.id,
            created_at: now,
        };
        let expected = record.version;
        record.apply(transition, now, officer_user);
        let assignment = OfficerAssignment {
            id: Uuid::new_v4(),
            application_id: record.id,
            officer_id: acting.officer.id,
            stage: previous,
            assigned_at: now,
            completed_at: Some(now),
            comments: appointment.comments.clone(),
            is_digitally_signed: false,
        };
        let stored = self.deps.applications.commit(
            ApplicationCommit::new(record, expected)
                .with_appointment(appointment.clone())
                .with_assignment(assignment),
        )?;

        info!(
            application = %stored.id,
            scheduled_for = %appointment.scheduled_for,
            "document verification appointment scheduled"
        );
        self.deps
            .notify(notifications::appointment_email(&stored, &appointment));
        Ok(appointment)
    }

    /// Create the officer row for an invited staff user. Repeat calls return the existing row.
    pub fn provision_officer(
        &self,
        user: &UserId,
        profile: OfficerProvisioning,
    ) -> Result<Officer, WorkflowError> {
        let account = self
            .deps
            .directory
            .user(user)?
            .ok_or_else(|| WorkflowError::not_found("user", user))?;
        let role = RoleClass::classify(&account.role);
        if !role.is_officer() {
            return Err(WorkflowError::Validation(format!(
                "role '{}' carries no officer privileges",
                account.role
            )));
        }
        if let Some(existing) = self.deps.directory.officer_for_user(user)? {
            return Ok(existing);
        }

        let officer = Officer {
            id: OfficerId(Uuid::new_v4()),
            user_id: user.clone(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            phone_number: profile.phone_number,
            key_label: profile.key_label.unwrap_or_default(),
            created_at: self.deps.clock.now(),
        };
        match self.deps.directory.insert_officer(officer) {
            Ok(stored) => {
                info!(officer = %stored.id, role = %account.role, "officer provisioned");
                Ok(stored)
            }
            Err(RepositoryError::Conflict(_)) => self
                .deps
                .directory
                .officer_for_user(user)?
                .ok_or_else(|| WorkflowError::Conflict(format!("officer for {user}"))),
            Err(other) => Err(other.into()),
        }
    }

    /// Account of an applicant who proved control of `email` with a login OTP, created on
    /// first sign-in and keyed by the normalized address.
    pub fn register_applicant(&self, email: &str) -> Result<UserAccount, WorkflowError> {
        let email = normalize_email(email)?;
        let id = UserId::new(&email);
        if let Some(existing) = self.deps.directory.user(&id)? {
            return Ok(existing);
        }
        let account = UserAccount {
            id: id.clone(),
            email,
            role: "User".to_string(),
            is_active: true,
        };
        match self.deps.directory.insert_user(account) {
            Ok(stored) => {
                info!(user = %stored.id, "applicant registered");
                Ok(stored)
            }
            Err(RepositoryError::Conflict(_)) => self
                .deps
                .directory
                .user(&id)?
                .ok_or_else(|| WorkflowError::Conflict(format!("user {id}"))),
            Err(other) => Err(other.into()),
        }
    }

    /// Admins create staff accounts; the invitee activates with [`Self::provision_officer`].
    pub fn invite_officer(
        &self,
        admin: &UserId,
        invitation: OfficerInvitation,
    ) -> Result<UserAccount, WorkflowError> {
        let inviter = self.deps.caller(admin)?;
        if RoleClass::classify(&inviter.role).level != OfficerLevel::Admin {
            return Err(WorkflowError::Unauthorized(format!(
                "{admin} may not invite officers"
            )));
        }
        let role = invitation.role.trim().to_string();
        if !RoleClass::classify(&role).is_officer() {
            return Err(WorkflowError::Validation(format!(
                "role '{role}' carries no officer privileges"
            )));
        }
        let email = normalize_email(&invitation.email)?;
        let account = UserAccount {
            id: UserId::new(&email),
            email: email.clone(),
            role,
            is_active: true,
        };
        let stored = match self.deps.directory.insert_user(account) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict(_)) => {
                return Err(WorkflowError::Conflict(format!(
                    "an account for {email} already exists"
                )))
            }
            Err(other) => return Err(other.into()),
        };
        self.deps
            .notify(notifications::officer_invitation_email(&stored.email, &stored.role));
        info!(user = %stored.id, role = %stored.role, invited_by = %admin, "officer invited");
        Ok(stored)
    }

    /// Store the unsigned recommended form that signatures will be applied to.
    pub fn attach_recommended_form(
        &self,
        id: &ApplicationId,
        officer_user: &UserId,
        pdf: &[u8],
    ) -> Result<ApplicationRecord, WorkflowError> {
        if pdf.is_empty() {
            return Err(WorkflowError::Validation(
                "recommended form is empty".to_string(),
            ));
        }
        let mut record = self.deps.load(id)?;
        let acting = self.deps.acting_officer(officer_user)?;
        access::authorize(&acting.role, record.stage(), record.position_type)?;

        let key = self
            .deps
            .documents
            .save(&format!("RecommendedForm_{}.pdf", record.id), pdf)?;
        let expected = record.version;
        record.workflow.recommended_form = Some(key.clone());
        record.touch(self.deps.clock.now(), officer_user);
        let stored = self
            .deps
            .commit_with_blob(ApplicationCommit::new(record, expected), &key)?;
        info!(application = %stored.id, "recommended form attached");
        Ok(stored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct OfficerInvitation {
    pub email: String,
    pub role: String,
}

fn normalize_email(email: &str) -> Result<String, WorkflowError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(WorkflowError::Validation(format!(
            "'{email}' is not an email address"
        )));
    }
    Ok(email)
}

/// Officer details captured when an invited user activates their account.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct OfficerProvisioning {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub key_label: Option<String>,
}

fn validate_form(form: &ApplicationForm) -> Result<(), WorkflowError> {
    let required = [
        ("first_name", &form.first_name),
        ("last_name", &form.last_name),
        ("mobile_number", &form.mobile_number),
        ("email_address", &form.email_address),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(WorkflowError::Validation(format!("{field} is required")));
        }
    }
    if !form.email_address.contains('@') {
        return Err(WorkflowError::Validation(format!(
            "'{}' is not an email address",
            form.email_address
        )));
    }
    Ok(())
}

/// Build an unnumbered record; qualification and experience certificates are linked by file id.
fn build_record(
    form: ApplicationForm,
    applicant: &UserId,
    now: DateTime<Utc>,
) -> ApplicationRecord {
    let qualifications: Vec<(String, Qualification)> = form
        .qualifications
        .into_iter()
        .map(|line| {
            (
                line.file_id,
                Qualification {
                    id: Uuid::new_v4(),
                    institute_name: line.institute_name,
                    university_name: line.university_name,
                    degree_name: line.degree_name,
                    passing_month: line.passing_month,
                    year_of_passing: line.year_of_passing,
                },
            )
        })
        .collect();
    let experiences: Vec<(String, Experience)> = form
        .experiences
        .into_iter()
        .map(|line| {
            (
                line.file_id,
                Experience {
                    id: Uuid::new_v4(),
                    company_name: line.company_name,
                    position: line.position,
                    years_of_experience: line.years_of_experience,
                    from_date: line.from_date,
                    to_date: line.to_date,
                },
            )
        })
        .collect();

    let documents = form
        .documents
        .into_iter()
        .map(|upload| {
            let file_id = upload.file_id.as_deref();
            let qualification_id = file_id
                .filter(|_| upload.document_type.belongs_to_qualification())
                .and_then(|file_id| {
                    qualifications
                        .iter()
                        .find(|(id, _)| id == file_id)
                        .map(|(_, q)| q.id)
                });
            let experience_id = file_id
                .filter(|_| upload.document_type.belongs_to_experience())
                .and_then(|file_id| {
                    experiences
                        .iter()
                        .find(|(id, _)| id == file_id)
                        .map(|(_, e)| e.id)
                });
            ApplicationDocument {
                id: Uuid::new_v4(),
                document_type: upload.document_type,
                file_name: upload.file_name,
                storage_key: upload.storage_key,
                qualification_id,
                experience_id,
                uploaded_at: now,
                is_verified: false,
            }
        })
        .collect();

    ApplicationRecord {
        id: ApplicationId::generate(),
        number: ApplicationNumber {
            year: now.year(),
            sequence: 0,
        },
        applicant_id: applicant.clone(),
        applicant: ApplicantDetails {
            first_name: form.first_name.trim().to_string(),
            middle_name: form.middle_name,
            last_name: form.last_name.trim().to_string(),
            mother_name: form.mother_name,
            mobile_number: form.mobile_number,
            email_address: form.email_address,
            blood_group: form.blood_group,
            height_cm: form.height_cm,
            gender: form.gender,
            date_of_birth: form.date_of_birth,
            pan_card_number: form.pan_card_number,
            aadhar_card_number: form.aadhar_card_number,
            coa_card_number: form.coa_card_number,
        },
        position_type: form.position_type,
        permanent_address: form.permanent_address,
        current_address: form.current_address,
        qualifications: qualifications.into_iter().map(|(_, q)| q).collect(),
        experiences: experiences.into_iter().map(|(_, e)| e).collect(),
        documents,
        submitted_at: now,
        workflow: WorkflowState::submitted(),
        version: 0,
    }
}

/// Error raised by the licensing services.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("external service failure: {0}")]
    ExternalService(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("repository failure: {0}")]
    Repository(RepositoryError),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(reason) => WorkflowError::Conflict(reason),
            other => WorkflowError::Repository(other),
        }
    }
}

impl From<AccessDenied> for WorkflowError {
    fn from(denied: AccessDenied) -> Self {
        WorkflowError::Unauthorized(denied.to_string())
    }
}

impl From<TransitionRefusal> for WorkflowError {
    fn from(refusal: TransitionRefusal) -> Self {
        match refusal {
            TransitionRefusal::Denied(denied) => denied.into(),
            TransitionRefusal::Invalid(invalid) => invalid.into(),
        }
    }
}

impl From<DocumentStoreError> for WorkflowError {
    fn from(error: DocumentStoreError) -> Self {
        match error {
            DocumentStoreError::NotFound(key) => WorkflowError::not_found("document", key),
            DocumentStoreError::Io(reason) => WorkflowError::ExternalService(reason),
        }
    }
}
