//! Licence certificates, issued once an application is APPROVED.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use mime::Mime;
use serde::Serialize;
use tracing::info;

use super::challan::RenderError;
use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStage, BlobKey, PositionType, UserId,
};
use super::repository::{
    ApplicationCommit, ApplicationQuery, DocumentDownload, QueryScope, RepositoryError,
};
use super::roles::{OfficerLevel, RoleClass};
use super::service::{WorkflowDeps, WorkflowError};

/// Years a licence stays valid after the issue year.
pub const CERTIFICATE_VALID_YEARS: i32 = 3;

/// Fields printed on the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateDraft {
    pub certificate_number: String,
    pub application_number: String,
    pub name: String,
    pub address: String,
    pub position: PositionType,
    pub valid_from: DateTime<Utc>,
    /// Valid through 31 December of this year.
    pub valid_to_year: i32,
    pub challan_number: Option<String>,
    pub amount_paid: Option<u64>,
}

pub trait CertificateRenderer: Send + Sync {
    fn render(&self, draft: &CertificateDraft) -> Result<Vec<u8>, RenderError>;

    fn media_type(&self) -> Mime {
        mime::APPLICATION_PDF
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    pub application_id: ApplicationId,
    pub certificate_number: String,
    pub file: BlobKey,
    pub generated_at: Option<DateTime<Utc>>,
    pub generated_by: Option<UserId>,
    /// False when an earlier issuance was returned.
    pub newly_generated: bool,
}

impl CertificateInfo {
    fn issued(record: &ApplicationRecord) -> Option<Self> {
        let workflow = &record.workflow;
        if !workflow.is_certificate_generated {
            return None;
        }
        Some(Self {
            application_id: record.id,
            certificate_number: workflow.certificate_number.clone()?,
            file: workflow.certificate_path.clone()?,
            generated_at: workflow.certificate_generated_at,
            generated_by: workflow.certificate_generated_by.clone(),
            newly_generated: false,
        })
    }
}

/// `PMC/{prefix}/{n}/{year}-{year+3}` with `n` counting today's certificates per category.
pub fn certificate_number(
    category: PositionType,
    issued_today: usize,
    issued_at: DateTime<Utc>,
) -> String {
    let prefix = match category {
        PositionType::Architect => "ARCH",
        PositionType::StructuralEngineer => "STR.ENGG",
        PositionType::LicenceEngineer => "LIC.ENGG",
        PositionType::Supervisor1 => "SUPER1",
        PositionType::Supervisor2 => "SUPER2",
    };
    let year = issued_at.year();
    format!(
        "PMC/{prefix}/{}/{year}-{}",
        issued_today + 1,
        year + CERTIFICATE_VALID_YEARS
    )
}

pub struct CertificateService {
    deps: WorkflowDeps,
    renderer: Arc<dyn CertificateRenderer>,
}

impl CertificateService {
    pub fn new(deps: WorkflowDeps, renderer: Arc<dyn CertificateRenderer>) -> Self {
        Self { deps, renderer }
    }

    /// Issue the certificate of an APPROVED application. Executive engineers, the city
    /// engineer and admins may issue; asking again returns the stored certificate.
    pub fn generate(
        &self,
        id: &ApplicationId,
        user: &UserId,
    ) -> Result<CertificateInfo, WorkflowError> {
        let mut record = self.deps.load(id)?;
        let account = self.deps.caller(user)?;
        let role = RoleClass::classify(&account.role);
        if !matches!(
            role.level,
            OfficerLevel::Executive | OfficerLevel::CityEngineer | OfficerLevel::Admin
        ) {
            return Err(WorkflowError::Unauthorized(format!(
                "{user} ({}) may not issue certificates",
                account.role
            )));
        }
        if let Some(existing) = CertificateInfo::issued(&record) {
            return Ok(existing);
        }
        if record.stage() != ApplicationStage::Approved {
            return Err(WorkflowError::Validation(format!(
                "certificates are issued for approved applications; {id} is {}",
                record.stage()
            )));
        }

        let now = self.deps.clock.now();
        let number = certificate_number(
            record.position_type,
            self.issued_on(record.position_type, now)?,
            now,
        );
        let challan = self
            .deps
            .applications
            .challan(id)?
            .filter(|challan| challan.is_generated);
        let draft = CertificateDraft {
            certificate_number: number.clone(),
            application_number: record.number.to_string(),
            name: record.applicant.full_name(),
            address: record.current_address.one_line(),
            position: record.position_type,
            valid_from: now,
            valid_to_year: now.year() + CERTIFICATE_VALID_YEARS,
            challan_number: challan.as_ref().map(|challan| challan.challan_number.clone()),
            amount_paid: challan.as_ref().map(|challan| challan.amount),
        };
        let rendered = self
            .renderer
            .render(&draft)
            .map_err(|error| WorkflowError::ExternalService(error.to_string()))?;
        let file = self.deps.documents.save(
            &format!(
                "Certificate_{}_{}.pdf",
                number.replace('/', "_"),
                now.format("%Y%m%d%H%M%S")
            ),
            &rendered,
        )?;

        let expected = record.version;
        let workflow = &mut record.workflow;
        workflow.is_certificate_generated = true;
        workflow.certificate_path = Some(file.clone());
        workflow.certificate_number = Some(number);
        workflow.certificate_generated_at = Some(now);
        workflow.certificate_generated_by = Some(user.clone());
        record.touch(now, user);
        match self
            .deps
            .commit_with_blob(ApplicationCommit::new(record, expected), &file)
        {
            Ok(stored) => {
                let mut issued = CertificateInfo::issued(&stored).ok_or_else(|| {
                    WorkflowError::Repository(RepositoryError::NotFound(format!(
                        "certificate of application {id}"
                    )))
                })?;
                issued.newly_generated = true;
                info!(
                    application = %id,
                    certificate = %issued.certificate_number,
                    "certificate issued"
                );
                Ok(issued)
            }
            // Lost a race with another issuer; theirs stands.
            Err(RepositoryError::Conflict(reason)) => {
                let current = self.deps.load(id)?;
                CertificateInfo::issued(&current).ok_or(WorkflowError::Conflict(reason))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Issuance details, readable by the applicant and by officers.
    pub fn info(
        &self,
        id: &ApplicationId,
        user: &UserId,
    ) -> Result<CertificateInfo, WorkflowError> {
        let record = self.deps.load(id)?;
        self.ensure_reader(&record, user)?;
        CertificateInfo::issued(&record)
            .ok_or_else(|| WorkflowError::not_found("certificate for application", id))
    }

    pub fn download(
        &self,
        id: &ApplicationId,
        user: &UserId,
    ) -> Result<DocumentDownload, WorkflowError> {
        let info = self.info(id, user)?;
        Ok(DocumentDownload {
            media_type: self.renderer.media_type(),
            bytes: self.deps.documents.read(&info.file)?,
        })
    }

    fn issued_on(
        &self,
        category: PositionType,
        now: DateTime<Utc>,
    ) -> Result<usize, WorkflowError> {
        let approved = self.deps.applications.query(&ApplicationQuery {
            scope: QueryScope::Stages {
                stages: vec![ApplicationStage::Approved],
                category: Some(category),
            },
            applicant_name: None,
            submitted_from: None,
            submitted_to: None,
            skip: 0,
            take: usize::MAX,
        })?;
        Ok(approved
            .iter()
            .filter_map(|record| record.workflow.certificate_generated_at)
            .filter(|issued| issued.date_naive() == now.date_naive())
            .count())
    }

    fn ensure_reader(
        &self,
        record: &ApplicationRecord,
        user: &UserId,
    ) -> Result<(), WorkflowError> {
        if record.is_owned_by(user) {
            return Ok(());
        }
        let account = self.deps.caller(user)?;
        if RoleClass::classify(&account.role).is_officer() {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized(format!(
                "{user} may not access the certificate of application {}",
                record.id
            )))
        }
    }
}
