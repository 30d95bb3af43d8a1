use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use pmcrms::workflows::licensing::memory::{
    InMemoryApplicationRepository, InMemoryDirectory, InMemoryOtpAttempts,
};
use pmcrms::workflows::licensing::signature::{OtpSessionRequest, SignPdfRequest};
use pmcrms::config::{
    AppEnvironment, IdentityConfig, PaymentConfig, DEVELOPMENT_CALLBACK_SECRET,
    SANDBOX_CHECKOUT_URL,
};
use pmcrms::workflows::licensing::{
    BlobKey, CallbackChecksum, CertificateDraft, CertificateRenderer, CertificateService,
    ChallanDraft, ChallanService, DocumentStore, DocumentStoreError, EmailMessage,
    LicenceApplicationService, LicensingApi, NotificationError, Notifier, OfficerProvisioning,
    OtpAttemptService, PaymentCallback, PaymentGateway, PaymentGatewayError, PaymentInitiation,
    PaymentRedirect, PaymentService, PositionType, RandomCodeGenerator, ReceiptRenderer,
    RenderError, SignatureCoordinator, SignerError, SigningService, SystemClock, UserAccount,
    UserId, WorkflowDeps, WorkflowError,
};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub(crate) const DEMO_PORTAL_URL: &str = "http://localhost:5173";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Adapters the licence services run against.
#[derive(Clone)]
pub(crate) struct Platform {
    pub(crate) directory: InMemoryDirectory,
    pub(crate) documents: Arc<dyn DocumentStore>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

pub(crate) fn licensing_api<S, P>(
    platform: &Platform,
    signer: S,
    gateway: P,
    fee: u64,
) -> LicensingApi<S, P>
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let clock = Arc::new(SystemClock);
    let codes = Arc::new(RandomCodeGenerator);
    let deps = WorkflowDeps {
        applications: Arc::new(InMemoryApplicationRepository::new()),
        directory: Arc::new(platform.directory.clone()),
        notifier: platform.notifier.clone(),
        documents: platform.documents.clone(),
        clock: clock.clone(),
    };
    let challans = Arc::new(ChallanService::new(
        deps.clone(),
        Arc::new(PlainTextReceiptRenderer),
        codes.clone(),
        fee,
    ));

    LicensingApi {
        applications: LicenceApplicationService::new(deps.clone()),
        signatures: SignatureCoordinator::new(deps.clone(), Arc::new(signer)),
        payments: PaymentService::new(
            deps.clone(),
            Arc::new(gateway),
            challans.clone(),
            codes.clone(),
            fee,
        ),
        challans,
        certificates: CertificateService::new(deps, Arc::new(PlainTextCertificateRenderer)),
        otp: OtpAttemptService::new(
            Arc::new(InMemoryOtpAttempts::default()),
            platform.notifier.clone(),
            clock,
            codes,
        ),
    }
}

/// Staff accounts available in non-production deployments, keyed by user id.
pub(crate) fn staff_roster() -> Vec<(String, String)> {
    let mut roster = Vec::new();
    for category in PositionType::ALL {
        let slug = category.as_str().to_ascii_lowercase();
        roster.push((format!("je-{slug}"), format!("Junior{category}")));
        roster.push((format!("ae-{slug}"), format!("Assistant{category}")));
    }
    for (id, role) in [
        ("ee", "ExecutiveEngineer"),
        ("ce", "CityEngineer"),
        ("clerk", "Clerk"),
        ("admin", "Admin"),
    ] {
        roster.push((id.to_string(), role.to_string()));
    }
    roster
}

/// Registers and provisions every roster account. Safe to call repeatedly.
pub(crate) fn seed_staff<S, P>(
    platform: &Platform,
    api: &LicensingApi<S, P>,
) -> Result<Vec<UserId>, WorkflowError> {
    let mut seeded = Vec::new();
    for (id, role) in staff_roster() {
        let user = UserId::new(&id);
        platform.directory.register_user(UserAccount {
            id: user.clone(),
            email: format!("{id}@pmc.gov.in"),
            role,
            is_active: true,
        })?;
        api.applications.provision_officer(
            &user,
            OfficerProvisioning {
                first_name: id.to_ascii_uppercase(),
                last_name: "Officer".to_string(),
                phone_number: None,
                key_label: Some(format!("{}_KEY", id.to_ascii_uppercase())),
            },
        )?;
        seeded.push(user);
    }
    info!(count = seeded.len(), "staff roster seeded");
    Ok(seeded)
}

/// Registers the configured administrator so staff can be invited in deployments that
/// skip the seeded roster.
pub(crate) fn bootstrap_admin(
    platform: &Platform,
    email: &str,
) -> Result<UserAccount, WorkflowError> {
    let email = email.trim().to_ascii_lowercase();
    if !email.contains('@') {
        return Err(WorkflowError::Validation(format!(
            "bootstrap admin '{email}' is not an email address"
        )));
    }
    let account = UserAccount {
        id: UserId::new(&email),
        email,
        role: "Admin".to_string(),
        is_active: true,
    };
    platform.directory.register_user(account.clone())?;
    info!(user = %account.id, "bootstrap admin registered");
    Ok(account)
}

/// Production starts from the bootstrap admin alone; other environments get the full
/// seeded roster as well.
pub(crate) fn provision_accounts<S, P>(
    environment: AppEnvironment,
    identity: &IdentityConfig,
    platform: &Platform,
    api: &LicensingApi<S, P>,
) -> Result<(), WorkflowError> {
    if let Some(email) = identity.bootstrap_admin.as_deref() {
        bootstrap_admin(platform, email)?;
    }
    if environment != AppEnvironment::Production {
        seed_staff(platform, api)?;
    }
    Ok(())
}

/// Blobs written as files under the media root.
pub(crate) struct FileSystemDocumentStore {
    root: PathBuf,
}

impl FileSystemDocumentStore {
    pub(crate) fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &BlobKey) -> Option<PathBuf> {
        let name = key.0.as_str();
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return None;
        }
        Some(self.root.join(name))
    }
}

fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl DocumentStore for FileSystemDocumentStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<BlobKey, DocumentStoreError> {
        let key = BlobKey(format!("{}_{}", Uuid::new_v4(), safe_file_name(name)));
        std::fs::write(self.root.join(&key.0), bytes)
            .map_err(|err| DocumentStoreError::Io(err.to_string()))?;
        Ok(key)
    }

    fn read(&self, key: &BlobKey) -> Result<Vec<u8>, DocumentStoreError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| DocumentStoreError::NotFound(key.clone()))?;
        match std::fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(DocumentStoreError::NotFound(key.clone()))
            }
            Err(err) => Err(DocumentStoreError::Io(err.to_string())),
        }
    }

    fn delete(&self, key: &BlobKey) -> Result<(), DocumentStoreError> {
        let Some(path) = self.path_for(key) else {
            return Ok(());
        };
        match std::fs::remove_file(path) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                Err(DocumentStoreError::Io(err.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Writes outgoing mail to the log instead of an SMTP relay.
pub(crate) struct LoggingNotifier {
    from_address: String,
}

impl LoggingNotifier {
    pub(crate) fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

impl Notifier for LoggingNotifier {
    fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if message.to.trim().is_empty() {
            return Err(NotificationError::Delivery("recipient is blank".to_string()));
        }
        info!(
            from = %self.from_address,
            to = %message.to,
            subject = %message.subject,
            "email dispatched"
        );
        Ok(())
    }
}

/// Payment settings for demos and in-process tests.
pub(crate) fn sandbox_payment(fee: u64) -> PaymentConfig {
    PaymentConfig {
        fee,
        checkout_url: SANDBOX_CHECKOUT_URL.to_string(),
        callback_secret: DEVELOPMENT_CALLBACK_SECRET.to_string(),
    }
}

/// Hands orders to the gateway's hosted checkout page and accepts only callbacks carrying
/// the shared-secret checksum.
pub(crate) struct HostedCheckoutGateway {
    checkout_url: String,
    return_url: String,
    checksum: CallbackChecksum,
}

impl HostedCheckoutGateway {
    /// The checkout sends the applicant back to `{portal_url}/payment/status`.
    pub(crate) fn new(payment: &PaymentConfig, portal_url: &str) -> Self {
        Self {
            checkout_url: payment.checkout_url.clone(),
            return_url: format!("{}/payment/status", portal_url.trim_end_matches('/')),
            checksum: CallbackChecksum::new(payment.callback_secret.clone()),
        }
    }

    /// Callback body as the gateway would post it.
    pub(crate) fn seal(&self, callback: &PaymentCallback) -> String {
        self.checksum.seal(callback)
    }
}

impl PaymentGateway for HostedCheckoutGateway {
    async fn initiate(
        &self,
        request: &PaymentInitiation,
    ) -> Result<PaymentRedirect, PaymentGatewayError> {
        if request.amount == 0 {
            return Err(PaymentGatewayError::Refused("amount must be positive".to_string()));
        }
        let parameters = BTreeMap::from([
            ("order_id".to_string(), request.order_id.clone()),
            ("amount".to_string(), format!("{}.00", request.amount)),
            ("currency".to_string(), "INR".to_string()),
            ("billing_name".to_string(), request.payer_name.clone()),
            ("billing_email".to_string(), request.payer_email.clone()),
            ("billing_tel".to_string(), request.payer_phone.clone()),
            ("merchant_param1".to_string(), request.application_id.to_string()),
            ("redirect_url".to_string(), self.return_url.clone()),
        ]);
        Ok(PaymentRedirect {
            order_id: request.order_id.clone(),
            redirect_url: self.checkout_url.clone(),
            parameters,
        })
    }

    fn verify_callback(&self, raw: &[u8]) -> Result<PaymentCallback, PaymentGatewayError> {
        self.checksum.open(raw)
    }
}

/// Signer that stamps documents locally, for demos and sandbox deployments.
pub(crate) struct SandboxSigner;

impl SigningService for SandboxSigner {
    async fn generate_otp(&self, request: &OtpSessionRequest) -> Result<String, SignerError> {
        Ok(format!(
            "{{\"status\":\"OTP_SENT\",\"txn\":\"{}\"}}",
            request.transaction_id
        ))
    }

    async fn sign_pdf(&self, request: &SignPdfRequest) -> Result<String, SignerError> {
        let mut document = STANDARD
            .decode(request.document_base64.as_bytes())
            .map_err(|err| SignerError::Configuration(format!("document is not base64: {err}")))?;
        document.extend_from_slice(
            format!("\n%signed:{}@{}", request.key_label, request.coordinates).as_bytes(),
        );
        Ok(format!(
            "<soap:Envelope><soap:Body><ns2:signPdfResponse><return>{}~SUCCESS~{}</return>\
             </ns2:signPdfResponse></soap:Body></soap:Envelope>",
            request.transaction_id,
            STANDARD.encode(document)
        ))
    }
}

/// Lays a challan out as plain text.
pub(crate) struct PlainTextReceiptRenderer;

impl ReceiptRenderer for PlainTextReceiptRenderer {
    fn render(&self, draft: &ChallanDraft) -> Result<Vec<u8>, RenderError> {
        if draft.name.trim().is_empty() {
            return Err(RenderError("challan has no payer name".to_string()));
        }
        let lines = [
            "PUNE MUNICIPAL CORPORATION".to_string(),
            format!("Challan No: {}", draft.challan_number),
            format!("Application No: {}", draft.application_number),
            format!("Date: {}", draft.challan_date.format("%d/%m/%Y")),
            format!("Name: {}", draft.name),
            format!("Position: {}", draft.position),
            format!("Address: {}", draft.address),
            format!("Mobile: {}", draft.mobile_number),
            format!("Amount: Rs. {}", draft.amount),
            format!("In words: {}", draft.amount_in_words),
        ];
        Ok(lines.join("\n").into_bytes())
    }

    fn media_type(&self) -> mime::Mime {
        mime::TEXT_PLAIN_UTF_8
    }
}

pub(crate) struct PlainTextCertificateRenderer;

impl CertificateRenderer for PlainTextCertificateRenderer {
    fn render(&self, draft: &CertificateDraft) -> Result<Vec<u8>, RenderError> {
        if draft.name.trim().is_empty() {
            return Err(RenderError("certificate has no licensee name".to_string()));
        }
        let lines = [
            "PUNE MUNICIPAL CORPORATION".to_string(),
            "LICENCE CERTIFICATE".to_string(),
            format!("Certificate No: {}", draft.certificate_number),
            format!("Application No: {}", draft.application_number),
            format!("Name: {}", draft.name),
            format!("Licence: {}", draft.position),
            format!("Address: {}", draft.address),
            format!(
                "Valid: {} to 31/12/{}",
                draft.valid_from.format("%d/%m/%Y"),
                draft.valid_to_year
            ),
            format!(
                "Fee: {}",
                match (&draft.challan_number, draft.amount_paid) {
                    (Some(challan), Some(amount)) => format!("Rs. {amount} (challan {challan})"),
                    _ => "not recorded".to_string(),
                }
            ),
        ];
        Ok(lines.join("\n").into_bytes())
    }

    fn media_type(&self) -> mime::Mime {
        mime::TEXT_PLAIN_UTF_8
    }
}
