//! Payment receipts (challans): one per application, generated at most once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mime::Mime;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::clock::CodeGenerator;
use super::domain::{ApplicationId, ApplicationRecord, BlobKey, Challan, UserId};
use super::repository::{ApplicationCommit, DocumentDownload, RepositoryError};
use super::roles::RoleClass;
use super::service::{WorkflowDeps, WorkflowError};

/// Everything the renderer needs to lay out a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallanDraft {
    pub application_number: String,
    pub challan_number: String,
    pub name: String,
    pub position: String,
    pub address: String,
    pub mobile_number: String,
    pub amount: u64,
    pub amount_in_words: String,
    pub challan_date: DateTime<Utc>,
}

/// Turns a challan draft into a printable document.
pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, draft: &ChallanDraft) -> Result<Vec<u8>, RenderError>;

    /// Media type of what `render` produces.
    fn media_type(&self) -> Mime {
        mime::APPLICATION_PDF
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("receipt rendering failed: {0}")]
pub struct RenderError(pub String);

/// Optional overrides when a challan is requested explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChallanRequest {
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallanReceipt {
    pub challan_number: String,
    pub file: BlobKey,
    pub amount: u64,
    /// False when an earlier generation was returned.
    pub newly_generated: bool,
}

impl ChallanReceipt {
    fn existing(challan: &Challan) -> Self {
        Self {
            challan_number: challan.challan_number.clone(),
            file: challan.file.clone(),
            amount: challan.amount,
            newly_generated: false,
        }
    }
}

pub struct ChallanService {
    deps: WorkflowDeps,
    renderer: Arc<dyn ReceiptRenderer>,
    codes: Arc<dyn CodeGenerator>,
    default_amount: u64,
}

impl ChallanService {
    pub fn new(
        deps: WorkflowDeps,
        renderer: Arc<dyn ReceiptRenderer>,
        codes: Arc<dyn CodeGenerator>,
        default_amount: u64,
    ) -> Self {
        Self {
            deps,
            renderer,
            codes,
            default_amount,
        }
    }

    /// Generate on behalf of a caller who must own the application or be an officer.
    pub fn generate_for(
        &self,
        id: &ApplicationId,
        user: &UserId,
        request: ChallanRequest,
    ) -> Result<ChallanReceipt, WorkflowError> {
        let record = self.deps.load(id)?;
        self.ensure_reader(&record, user)?;
        self.generate(record, request)
    }

    /// Idempotent: an application that already has a challan gets the stored one back.
    pub fn generate(
        &self,
        mut record: ApplicationRecord,
        request: ChallanRequest,
    ) -> Result<ChallanReceipt, WorkflowError> {
        if let Some(existing) = self.existing(&record.id)? {
            return Ok(ChallanReceipt::existing(&existing));
        }

        let now = self.deps.clock.now();
        let amount = request.amount.unwrap_or(self.default_amount);
        let draft = ChallanDraft {
            application_number: record.number.to_string(),
            challan_number: format!("CH{}{}", now.format("%Y%m%d"), self.codes.digits(6)),
            name: request
                .name
                .unwrap_or_else(|| record.applicant.full_name()),
            position: request
                .position
                .unwrap_or_else(|| record.position_type.to_string()),
            address: record.current_address.one_line(),
            mobile_number: record.applicant.mobile_number.clone(),
            amount,
            amount_in_words: amount_in_words(amount),
            challan_date: now,
        };
        let rendered = self
            .renderer
            .render(&draft)
            .map_err(|error| WorkflowError::ExternalService(error.to_string()))?;
        let file = self.deps.documents.save(
            &format!("Challan_{}_{}.pdf", record.id, now.format("%Y%m%d_%H%M%S")),
            &rendered,
        )?;

        let challan = Challan {
            id: Uuid::new_v4(),
            application_id: record.id,
            challan_number: draft.challan_number,
            name: draft.name,
            position: draft.position,
            amount,
            amount_in_words: draft.amount_in_words,
            challan_date: now,
            mobile_number: draft.mobile_number,
            address: draft.address,
            file: file.clone(),
            is_generated: true,
        };
        let expected = record.version;
        record.workflow.is_challan_generated = true;
        record.workflow.challan_path = Some(file.clone());
        let application_id = record.id;
        match self.deps.commit_with_blob(
            ApplicationCommit::new(record, expected).with_challan(challan.clone()),
            &file,
        ) {
            Ok(_) => {
                info!(application = %application_id, challan = %challan.challan_number, "challan generated");
                Ok(ChallanReceipt {
                    challan_number: challan.challan_number,
                    file: challan.file,
                    amount,
                    newly_generated: true,
                })
            }
            // A concurrent request may have won; hand back its challan.
            Err(RepositoryError::Conflict(reason)) => match self.existing(&application_id)? {
                Some(existing) => Ok(ChallanReceipt::existing(&existing)),
                None => Err(WorkflowError::Conflict(reason)),
            },
            Err(other) => Err(other.into()),
        }
    }

    /// The generated receipt, typed by the renderer that produced it.
    pub fn download_challan(
        &self,
        id: &ApplicationId,
        user: &UserId,
    ) -> Result<DocumentDownload, WorkflowError> {
        let record = self.deps.load(id)?;
        self.ensure_reader(&record, user)?;
        let challan = self
            .existing(id)?
            .ok_or_else(|| WorkflowError::not_found("challan for application", id))?;
        Ok(DocumentDownload {
            media_type: self.renderer.media_type(),
            bytes: self.deps.documents.read(&challan.file)?,
        })
    }

    fn existing(&self, id: &ApplicationId) -> Result<Option<Challan>, WorkflowError> {
        Ok(self
            .deps
            .applications
            .challan(id)?
            .filter(|challan| challan.is_generated))
    }

    fn ensure_reader(&self, record: &ApplicationRecord, user: &UserId) -> Result<(), WorkflowError> {
        if record.is_owned_by(user) {
            return Ok(());
        }
        let account = self.deps.caller(user)?;
        if RoleClass::classify(&account.role).is_officer() {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized(format!(
                "{user} may not access challans of application {}",
                record.id
            )))
        }
    }
}

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];
const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn below_hundred(value: u64) -> String {
    match value {
        0..=19 => ONES[value as usize].to_string(),
        _ => {
            let tens = TENS[(value / 10) as usize];
            match value % 10 {
                0 => tens.to_string(),
                unit => format!("{tens} {}", ONES[unit as usize]),
            }
        }
    }
}

/// Rupee amount spelled out with Indian grouping (crore, lakh, thousand).
pub fn amount_in_words(amount: u64) -> String {
    if amount == 0 {
        return "Zero Rupees Only".to_string();
    }

    let crore = amount / 10_000_000;
    let rest = amount % 10_000_000;
    let mut words = Vec::new();
    if crore > 0 {
        // Crore counts can themselves exceed ninety nine.
        let prefix = amount_in_words(crore);
        words.push(format!(
            "{} Crore",
            prefix.trim_end_matches(" Rupees Only")
        ));
    }
    let groups = [
        (rest / 100_000, "Lakh"),
        ((rest / 1_000) % 100, "Thousand"),
        ((rest / 100) % 10, "Hundred"),
    ];
    for (count, unit) in groups {
        if count > 0 {
            words.push(format!("{} {unit}", below_hundred(count)));
        }
    }
    if rest % 100 > 0 {
        words.push(below_hundred(rest % 100));
    }
    format!("{} Rupees Only", words.join(" "))
}
