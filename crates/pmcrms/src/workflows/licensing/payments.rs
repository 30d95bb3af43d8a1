use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::challan::{ChallanRequest, ChallanService};
use super::clock::CodeGenerator;
use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStage, PaymentTransaction, TransactionStatus,
    UserId,
};
use super::notifications;
use super::repository::ApplicationCommit;
use super::service::{WorkflowDeps, WorkflowError};
use super::transitions::{self, Actor, TransitionTrigger};

/// Request sent to the payment gateway to open a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInitiation {
    pub order_id: String,
    pub application_id: ApplicationId,
    pub amount: u64,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
}

/// Where to send the applicant's browser, plus the form fields the gateway expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRedirect {
    pub order_id: String,
    pub redirect_url: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Gateway callback after the applicant finished (or abandoned) checkout.
///
/// Only a value returned by [`PaymentGateway::verify_callback`] is ever acted on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentCallback {
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PaymentCallback {
    fn succeeded(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("success")
    }
}

pub trait PaymentGateway: Send + Sync {
    fn initiate(
        &self,
        request: &PaymentInitiation,
    ) -> impl Future<Output = Result<PaymentRedirect, PaymentGatewayError>> + Send;

    /// Authenticate the raw body the gateway posted back and decode it.
    fn verify_callback(&self, raw: &[u8]) -> Result<PaymentCallback, PaymentGatewayError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PaymentGatewayError {
    #[error("payment gateway unreachable: {0}")]
    Transport(String),
    #[error("payment gateway refused the order: {0}")]
    Refused(String),
    #[error("payment callback failed verification: {0}")]
    Unverified(String),
}

impl From<PaymentGatewayError> for WorkflowError {
    fn from(error: PaymentGatewayError) -> Self {
        match error {
            PaymentGatewayError::Unverified(_) => WorkflowError::Unauthorized(error.to_string()),
            other => WorkflowError::ExternalService(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ChecksummedCallback {
    #[serde(flatten)]
    callback: PaymentCallback,
    checksum: String,
}

/// SHA-256 checksum keyed with the merchant secret shared with the gateway.
///
/// The gateway posts the callback fields as JSON with an extra `checksum` member.
#[derive(Clone)]
pub struct CallbackChecksum {
    secret: String,
}

impl CallbackChecksum {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Lowercase hex digest over every callback field and the secret.
    pub fn digest(&self, callback: &PaymentCallback) -> String {
        let fields = [
            Some(&callback.order_id),
            Some(&callback.status),
            callback.amount.as_ref(),
            callback.mode.as_ref(),
            callback.card_type.as_ref(),
            callback.error_message.as_ref(),
        ];
        let mut hasher = Sha256::new();
        for field in fields {
            let value = field.map(String::as_str).unwrap_or_default();
            // Length-prefixed so field boundaries cannot shift.
            hasher.update(format!("{}:{value}|", value.len()).as_bytes());
        }
        hasher.update(self.secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// The JSON body a gateway holding the same secret would post back.
    pub fn seal(&self, callback: &PaymentCallback) -> String {
        json!({
            "order_id": callback.order_id,
            "status": callback.status,
            "amount": callback.amount,
            "mode": callback.mode,
            "card_type": callback.card_type,
            "error_message": callback.error_message,
            "checksum": self.digest(callback),
        })
        .to_string()
    }

    pub fn open(&self, raw: &[u8]) -> Result<PaymentCallback, PaymentGatewayError> {
        let sealed: ChecksummedCallback = serde_json::from_slice(raw).map_err(|err| {
            PaymentGatewayError::Unverified(format!("callback body is malformed: {err}"))
        })?;
        let expected = self.digest(&sealed.callback);
        let presented = sealed.checksum.trim().to_ascii_lowercase();
        if !same_bytes(expected.as_bytes(), presented.as_bytes()) {
            return Err(PaymentGatewayError::Unverified(format!(
                "checksum mismatch for order {}",
                sealed.callback.order_id
            )));
        }
        Ok(sealed.callback)
    }
}

/// Compares without stopping at the first differing byte.
fn same_bytes(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Completed {
        stage: ApplicationStage,
        challan_number: Option<String>,
    },
    AlreadyCompleted,
    Failed {
        reason: String,
    },
}

pub struct PaymentService<P> {
    deps: WorkflowDeps,
    gateway: Arc<P>,
    challans: Arc<ChallanService>,
    codes: Arc<dyn CodeGenerator>,
    fee: u64,
}

impl<P> PaymentService<P>
where
    P: PaymentGateway + 'static,
{
    pub fn new(
        deps: WorkflowDeps,
        gateway: Arc<P>,
        challans: Arc<ChallanService>,
        codes: Arc<dyn CodeGenerator>,
        fee: u64,
    ) -> Self {
        Self {
            deps,
            gateway,
            challans,
            codes,
            fee,
        }
    }

    /// Open a checkout for the licence fee. Only the applicant may pay, and only at PAYMENT_PENDING.
    pub async fn initiate_payment(
        &self,
        id: &ApplicationId,
        user: &UserId,
    ) -> Result<PaymentRedirect, WorkflowError> {
        let record = self.deps.load(id)?;
        if !record.is_owned_by(user) {
            return Err(WorkflowError::Unauthorized(format!(
                "{user} is not the applicant of {id}"
            )));
        }
        if record.stage() != ApplicationStage::PaymentPending {
            return Err(WorkflowError::Validation(format!(
                "payment is not expected while the application is {}",
                record.stage()
            )));
        }
        if let Some(existing) = self.deps.applications.transaction(id)? {
            if existing.status == TransactionStatus::Success {
                return Err(WorkflowError::Conflict(format!(
                    "application {id} is already paid"
                )));
            }
        }

        let now = self.deps.clock.now();
        let order_id = format!("PMC{}{}", now.format("%y%m%d%H%M"), self.codes.digits(3));
        let redirect = self
            .gateway
            .initiate(&PaymentInitiation {
                order_id: order_id.clone(),
                application_id: record.id,
                amount: self.fee,
                payer_name: record.applicant.full_name(),
                payer_email: record.applicant.email_address.clone(),
                payer_phone: record.applicant.mobile_number.clone(),
            })
            .await?;

        let transaction = PaymentTransaction {
            id: Uuid::new_v4(),
            order_id,
            application_id: record.id,
            status: TransactionStatus::Pending,
            price: self.fee,
            first_name: record.applicant.first_name.clone(),
            last_name: record.applicant.last_name.clone(),
            email: record.applicant.email_address.clone(),
            phone_number: record.applicant.mobile_number.clone(),
            gateway_status: None,
            error_message: None,
            card_type: None,
            mode: None,
            amount_paid: None,
            created_at: now,
            updated_at: now,
        };
        let expected = record.version;
        self.deps
            .applications
            .commit(ApplicationCommit::new(record, expected).with_transaction(transaction))?;
        info!(application = %id, order = %redirect.order_id, "payment initiated");
        Ok(redirect)
    }

    /// Record the gateway verdict carried by the raw callback `body`. Bodies the gateway
    /// cannot vouch for are refused before anything is read or written. Success advances
    /// to CLERK_PENDING and issues the challan.
    pub fn complete_payment(
        &self,
        id: &ApplicationId,
        body: &[u8],
    ) -> Result<PaymentOutcome, WorkflowError> {
        let callback = self.gateway.verify_callback(body).map_err(|refusal| {
            warn!(application = %id, error = %refusal, "payment callback rejected");
            WorkflowError::from(refusal)
        })?;
        let mut record = self.deps.load(id)?;
        let mut transaction = self
            .deps
            .applications
            .transaction(id)?
            .filter(|transaction| transaction.order_id == callback.order_id)
            .ok_or_else(|| WorkflowError::not_found("payment order", &callback.order_id))?;
        if transaction.status == TransactionStatus::Success {
            return Ok(PaymentOutcome::AlreadyCompleted);
        }

        let now = self.deps.clock.now();
        transaction.gateway_status = Some(callback.status.clone());
        transaction.amount_paid = callback.amount.clone();
        transaction.mode = callback.mode.clone();
        transaction.card_type = callback.card_type.clone();
        transaction.updated_at = now;
        let expected = record.version;

        if !callback.succeeded() {
            let reason = callback
                .error_message
                .clone()
                .unwrap_or_else(|| format!("gateway reported {}", callback.status));
            transaction.status = TransactionStatus::Failed;
            transaction.error_message = Some(reason.clone());
            self.deps
                .applications
                .commit(ApplicationCommit::new(record, expected).with_transaction(transaction))?;
            warn!(application = %id, %reason, "payment failed");
            return Ok(PaymentOutcome::Failed { reason });
        }

        let previous = record.stage();
        let transition = transitions::plan(
            previous,
            ApplicationStage::ClerkPending,
            TransitionTrigger::PaymentCompletion,
            &Actor::PaymentGateway,
            record.position_type,
        )?;
        transaction.status = TransactionStatus::Success;
        transaction.error_message = None;
        record.workflow.is_payment_complete = true;
        let applicant = record.applicant_id.clone();
        record.apply(transition, now, &applicant);
        let stored = self
            .deps
            .applications
            .commit(ApplicationCommit::new(record, expected).with_transaction(transaction))?;
        info!(application = %stored.id, "payment completed");

        let challan_number = self.issue_challan(&stored);
        self.deps.notify(notifications::stage_update_email(
            &stored,
            previous,
            "PMC Payment Desk",
            None,
        ));
        Ok(PaymentOutcome::Completed {
            stage: stored.stage(),
            challan_number,
        })
    }

    /// Secondary to the payment itself; failures are logged only.
    fn issue_challan(&self, record: &ApplicationRecord) -> Option<String> {
        let request = ChallanRequest {
            amount: Some(self.fee),
            ..ChallanRequest::default()
        };
        match self.challans.generate(record.clone(), request) {
            Ok(receipt) => Some(receipt.challan_number),
            Err(failure) => {
                error!(application = %record.id, error = %failure, "challan generation failed after payment");
                None
            }
        }
    }
}
