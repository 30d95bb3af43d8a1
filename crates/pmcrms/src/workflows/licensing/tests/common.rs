use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::licensing::certificate::{
    CertificateDraft, CertificateRenderer, CertificateService,
};
use crate::workflows::licensing::challan::{
    ChallanDraft, ChallanService, ReceiptRenderer, RenderError,
};
use crate::workflows::licensing::clock::{Clock, CodeGenerator};
use crate::workflows::licensing::domain::{
    Address, ApplicationForm, ApplicationId, ApplicationRecord, ApplicationStage, Appointment,
    AppointmentDetails, BlobKey, Challan, DocumentType, DocumentUpload, ExperienceForm, Gender,
    OfficerAssignment, OtpVerification, PaymentTransaction, PositionType, QualificationForm,
    UserAccount, UserId,
};
use crate::workflows::licensing::memory::{
    InMemoryApplicationRepository, InMemoryDirectory, InMemoryDocumentStore, InMemoryOtpAttempts,
    OutboxNotifier,
};
use crate::workflows::licensing::otp::OtpAttemptService;
use crate::workflows::licensing::payments::{
    CallbackChecksum, PaymentCallback, PaymentGateway, PaymentGatewayError, PaymentInitiation,
    PaymentRedirect, PaymentService,
};
use crate::workflows::licensing::repository::{
    ApplicationCommit, ApplicationQuery, ApplicationRepository, DocumentStore, EmailMessage,
    NotificationError, Notifier, RepositoryError,
};
use crate::workflows::licensing::router::LicensingApi;
use crate::workflows::licensing::service::{
    LicenceApplicationService, OfficerProvisioning, WorkflowDeps,
};
use crate::workflows::licensing::signature::{
    OtpSessionRequest, SignPdfRequest, SignatureCoordinator, SignerError, SigningService,
};

/// Clock frozen at a settable instant.
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid instant")
}

/// Counts upward so generated codes are distinct and predictable.
#[derive(Default)]
pub(super) struct CountingCodes {
    next: AtomicU64,
}

impl CodeGenerator for CountingCodes {
    fn digits(&self, len: usize) -> String {
        let value = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let text = format!("{value:0width$}", width = len);
        text[text.len() - len..].to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SignMode {
    Succeed(Vec<u8>),
    Reject,
    Garbage,
    Unreachable,
}

/// Signer that answers the way the HSM would, according to `mode`.
pub(super) struct ScriptedSigner {
    mode: Mutex<SignMode>,
    otp_payload: Mutex<String>,
    sign_requests: Mutex<Vec<SignPdfRequest>>,
    otp_requests: Mutex<Vec<OtpSessionRequest>>,
}

impl Default for ScriptedSigner {
    fn default() -> Self {
        Self {
            mode: Mutex::new(SignMode::Succeed(b"%PDF-1.7 signed".to_vec())),
            otp_payload: Mutex::new("{\"status\":\"OTP sent\"}".to_string()),
            sign_requests: Mutex::new(Vec::new()),
            otp_requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedSigner {
    pub(super) fn set_mode(&self, mode: SignMode) {
        *self.mode.lock().expect("signer lock") = mode;
    }

    pub(super) fn set_otp_payload(&self, payload: &str) {
        *self.otp_payload.lock().expect("signer lock") = payload.to_string();
    }

    pub(super) fn sign_requests(&self) -> Vec<SignPdfRequest> {
        self.sign_requests.lock().expect("signer lock").clone()
    }

    pub(super) fn otp_requests(&self) -> Vec<OtpSessionRequest> {
        self.otp_requests.lock().expect("signer lock").clone()
    }
}

impl SigningService for ScriptedSigner {
    async fn generate_otp(&self, request: &OtpSessionRequest) -> Result<String, SignerError> {
        self.otp_requests
            .lock()
            .expect("signer lock")
            .push(request.clone());
        Ok(self.otp_payload.lock().expect("signer lock").clone())
    }

    async fn sign_pdf(&self, request: &SignPdfRequest) -> Result<String, SignerError> {
        self.sign_requests
            .lock()
            .expect("signer lock")
            .push(request.clone());
        let txn = &request.transaction_id;
        let inner = match self.mode.lock().expect("signer lock").clone() {
            SignMode::Succeed(bytes) => format!("{txn}~SUCCESS~{}", STANDARD.encode(bytes)),
            SignMode::Reject => format!("{txn}~FAILURE~failure"),
            SignMode::Garbage => "???".to_string(),
            SignMode::Unreachable => {
                return Err(SignerError::Transport("connection refused".to_string()))
            }
        };
        Ok(format!(
            "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
             <soap:Body><ns2:signPdfResponse xmlns:ns2=\"http://ds.ws.emas/\">\
             <return>{inner}</return></ns2:signPdfResponse></soap:Body></soap:Envelope>"
        ))
    }
}

pub(super) const GATEWAY_SECRET: &str = "merchant-secret";

/// Gateway that always hands back a redirect, or refuses when told to. Callbacks must carry
/// a checksum made with [`GATEWAY_SECRET`].
pub(super) struct SandboxGateway {
    refuse: Mutex<bool>,
    initiated: Mutex<Vec<PaymentInitiation>>,
    checksum: CallbackChecksum,
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self {
            refuse: Mutex::new(false),
            initiated: Mutex::new(Vec::new()),
            checksum: CallbackChecksum::new(GATEWAY_SECRET),
        }
    }
}

impl SandboxGateway {
    /// Body the gateway would post back for `callback`.
    pub(super) fn seal(&self, callback: &PaymentCallback) -> String {
        self.checksum.seal(callback)
    }

    pub(super) fn refuse_orders(&self) {
        *self.refuse.lock().expect("gateway lock") = true;
    }

    pub(super) fn initiated(&self) -> Vec<PaymentInitiation> {
        self.initiated.lock().expect("gateway lock").clone()
    }
}

impl PaymentGateway for SandboxGateway {
    async fn initiate(
        &self,
        request: &PaymentInitiation,
    ) -> Result<PaymentRedirect, PaymentGatewayError> {
        if *self.refuse.lock().expect("gateway lock") {
            return Err(PaymentGatewayError::Refused("merchant disabled".to_string()));
        }
        self.initiated
            .lock()
            .expect("gateway lock")
            .push(request.clone());
        Ok(PaymentRedirect {
            order_id: request.order_id.clone(),
            redirect_url: "https://sandbox.gateway.test/checkout".to_string(),
            parameters: [("order_id".to_string(), request.order_id.clone())]
                .into_iter()
                .collect(),
        })
    }

    fn verify_callback(&self, raw: &[u8]) -> Result<PaymentCallback, PaymentGatewayError> {
        self.checksum.open(raw)
    }
}

#[derive(Default)]
pub(super) struct TextRenderer {
    fail: Mutex<bool>,
}

impl TextRenderer {
    pub(super) fn fail_renders(&self) {
        *self.fail.lock().expect("renderer lock") = true;
    }
}

impl ReceiptRenderer for TextRenderer {
    fn render(&self, draft: &ChallanDraft) -> Result<Vec<u8>, RenderError> {
        if *self.fail.lock().expect("renderer lock") {
            return Err(RenderError("font cache missing".to_string()));
        }
        Ok(format!(
            "CHALLAN {}\n{}\n{} ({})",
            draft.challan_number, draft.name, draft.amount, draft.amount_in_words
        )
        .into_bytes())
    }

    fn media_type(&self) -> mime::Mime {
        mime::TEXT_PLAIN_UTF_8
    }
}

impl CertificateRenderer for TextRenderer {
    fn render(&self, draft: &CertificateDraft) -> Result<Vec<u8>, RenderError> {
        if *self.fail.lock().expect("renderer lock") {
            return Err(RenderError("font cache missing".to_string()));
        }
        Ok(format!(
            "CERTIFICATE {}\n{} ({})\nvalid to {}",
            draft.certificate_number, draft.name, draft.position, draft.valid_to_year
        )
        .into_bytes())
    }

    fn media_type(&self) -> mime::Mime {
        mime::TEXT_PLAIN_UTF_8
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _message: &EmailMessage) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("smtp timeout".to_string()))
    }
}

/// Fully wired services over in-memory stores.
pub(super) struct Harness {
    pub applications: InMemoryApplicationRepository,
    pub directory: InMemoryDirectory,
    pub documents: InMemoryDocumentStore,
    pub outbox: OutboxNotifier,
    pub clock: Arc<FixedClock>,
    pub signer: Arc<ScriptedSigner>,
    pub gateway: Arc<SandboxGateway>,
    pub renderer: Arc<TextRenderer>,
    pub deps: WorkflowDeps,
    pub api: TestApi,
}

pub(super) type TestApi = Arc<LicensingApi<ScriptedSigner, SandboxGateway>>;

pub(super) const FEE: u64 = 3000;

pub(super) fn harness() -> Harness {
    harness_with_notifier(None)
}

pub(super) fn harness_with_notifier(notifier: Option<Arc<dyn Notifier>>) -> Harness {
    let applications = InMemoryApplicationRepository::new();
    let directory = InMemoryDirectory::new();
    let documents = InMemoryDocumentStore::default();
    let outbox = OutboxNotifier::default();
    let clock = Arc::new(FixedClock::at(start_time()));
    let signer = Arc::new(ScriptedSigner::default());
    let gateway = Arc::new(SandboxGateway::default());
    let renderer = Arc::new(TextRenderer::default());

    let deps = WorkflowDeps {
        applications: Arc::new(applications.clone()),
        directory: Arc::new(directory.clone()),
        notifier: notifier.unwrap_or_else(|| Arc::new(outbox.clone())),
        documents: Arc::new(documents.clone()),
        clock: clock.clone(),
    };
    let api = build_api(deps.clone(), &signer, &gateway, &renderer);

    Harness {
        applications,
        directory,
        documents,
        outbox,
        clock,
        signer,
        gateway,
        renderer,
        deps,
        api,
    }
}

fn build_api(
    deps: WorkflowDeps,
    signer: &Arc<ScriptedSigner>,
    gateway: &Arc<SandboxGateway>,
    renderer: &Arc<TextRenderer>,
) -> TestApi {
    let codes: Arc<dyn CodeGenerator> = Arc::new(CountingCodes::default());
    let challans = Arc::new(ChallanService::new(
        deps.clone(),
        renderer.clone(),
        codes.clone(),
        FEE,
    ));
    Arc::new(LicensingApi {
        applications: LicenceApplicationService::new(deps.clone()),
        signatures: SignatureCoordinator::new(deps.clone(), signer.clone()),
        payments: PaymentService::new(
            deps.clone(),
            gateway.clone(),
            challans.clone(),
            codes.clone(),
            FEE,
        ),
        challans,
        certificates: CertificateService::new(deps.clone(), renderer.clone()),
        otp: OtpAttemptService::new(
            Arc::new(InMemoryOtpAttempts::default()),
            deps.notifier,
            deps.clock,
            codes,
        ),
    })
}

impl Harness {
    /// Services whose reads keep returning the first snapshot of each application.
    pub(super) fn stale_api(&self) -> TestApi {
        let deps = WorkflowDeps {
            applications: Arc::new(StaleSnapshots::over(self.applications.clone())),
            ..self.deps.clone()
        };
        build_api(deps, &self.signer, &self.gateway, &self.renderer)
    }

    pub(super) fn register(&self, id: &str, role: &str) -> UserId {
        let user = UserId::new(id);
        self.directory
            .register_user(UserAccount {
                id: user.clone(),
                email: format!("{id}@pmc.test"),
                role: role.to_string(),
                is_active: true,
            })
            .expect("user registers");
        user
    }

    /// Registers a staff user and activates their officer profile.
    pub(super) fn officer(&self, id: &str, role: &str) -> UserId {
        let user = self.register(id, role);
        self.api
            .applications
            .provision_officer(
                &user,
                OfficerProvisioning {
                    first_name: id.to_string(),
                    last_name: "Officer".to_string(),
                    phone_number: None,
                    key_label: Some(format!("{}_KEY", id.to_uppercase())),
                },
            )
            .expect("officer provisions");
        user
    }

    pub(super) fn applicant(&self, id: &str) -> UserId {
        self.register(id, "User")
    }

    pub(super) fn submit(&self, applicant: &UserId, category: PositionType) -> ApplicationRecord {
        self.api
            .applications
            .create_application(form(category), applicant)
            .expect("application submits")
    }

    pub(super) fn record(&self, id: &ApplicationId) -> ApplicationRecord {
        self.applications
            .fetch(id)
            .expect("store readable")
            .expect("application exists")
    }

    /// Place an application at `stage` without walking the workflow.
    pub(super) fn force_stage(&self, id: &ApplicationId, stage: ApplicationStage) {
        let mut record = self.record(id);
        let expected = record.version;
        record.force_stage(stage);
        self.applications
            .commit(ApplicationCommit::new(record, expected))
            .expect("stage forced");
    }

    pub(super) fn attach_form(&self, id: &ApplicationId) -> BlobKey {
        let mut record = self.record(id);
        let key = self
            .documents
            .save("RecommendedForm.pdf", b"%PDF-1.7 unsigned")
            .expect("form stored");
        let expected = record.version;
        record.workflow.recommended_form = Some(key.clone());
        self.applications
            .commit(ApplicationCommit::new(record, expected))
            .expect("form attached");
        key
    }
}

fn address(line: &str) -> Address {
    Address {
        address_line1: line.to_string(),
        address_line2: None,
        address_line3: None,
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        country: "India".to_string(),
        pin_code: "411005".to_string(),
    }
}

pub(super) fn form(category: PositionType) -> ApplicationForm {
    named_form(category, "Asha", "Kulkarni")
}

pub(super) fn named_form(category: PositionType, first: &str, last: &str) -> ApplicationForm {
    ApplicationForm {
        first_name: first.to_string(),
        middle_name: None,
        last_name: last.to_string(),
        mother_name: Some("Sunita".to_string()),
        mobile_number: "9822012345".to_string(),
        email_address: format!("{}@example.in", first.to_lowercase()),
        position_type: category,
        blood_group: Some("B+".to_string()),
        height_cm: Some(162.0),
        gender: Gender::Female,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 1).expect("valid date"),
        permanent_address: address("14 Karve Road"),
        current_address: address("7 Baner Road"),
        pan_card_number: Some("ABCPK1234D".to_string()),
        aadhar_card_number: Some("123412341234".to_string()),
        coa_card_number: None,
        qualifications: vec![QualificationForm {
            file_id: "q-1".to_string(),
            institute_name: "COEP".to_string(),
            university_name: "Savitribai Phule Pune University".to_string(),
            degree_name: "B.E. Civil".to_string(),
            passing_month: 5,
            year_of_passing: 2012,
        }],
        experiences: vec![ExperienceForm {
            file_id: "e-1".to_string(),
            company_name: "Deccan Structures".to_string(),
            position: "Site Engineer".to_string(),
            years_of_experience: 6,
            from_date: NaiveDate::from_ymd_opt(2013, 1, 1).expect("valid date"),
            to_date: NaiveDate::from_ymd_opt(2019, 1, 1).expect("valid date"),
        }],
        documents: vec![
            DocumentUpload {
                document_type: DocumentType::QualificationCertificate,
                file_name: "degree.pdf".to_string(),
                storage_key: BlobKey("blob-degree".to_string()),
                file_id: Some("q-1".to_string()),
            },
            DocumentUpload {
                document_type: DocumentType::ExperienceCertificate,
                file_name: "experience.pdf".to_string(),
                storage_key: BlobKey("blob-experience".to_string()),
                file_id: Some("e-1".to_string()),
            },
            DocumentUpload {
                document_type: DocumentType::PanCard,
                file_name: "pan.pdf".to_string(),
                storage_key: BlobKey("blob-pan".to_string()),
                file_id: None,
            },
        ],
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Serves the first snapshot it read for each application, like a client holding a stale copy.
pub(super) struct StaleSnapshots {
    inner: InMemoryApplicationRepository,
    seen: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
}

impl StaleSnapshots {
    pub(super) fn over(inner: InMemoryApplicationRepository) -> Self {
        Self {
            inner,
            seen: Mutex::new(HashMap::new()),
        }
    }
}

impl ApplicationRepository for StaleSnapshots {
    fn allocate_sequence(&self, year: i32) -> Result<u32, RepositoryError> {
        self.inner.allocate_sequence(year)
    }

    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let mut seen = self.seen.lock().expect("snapshot lock");
        if let Some(snapshot) = seen.get(id) {
            return Ok(Some(snapshot.clone()));
        }
        let fresh = self.inner.fetch(id)?;
        if let Some(record) = &fresh {
            seen.insert(*id, record.clone());
        }
        Ok(fresh)
    }

    fn query(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.query(query)
    }

    fn commit(&self, commit: ApplicationCommit) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.commit(commit)
    }

    fn appointment(&self, id: &ApplicationId) -> Result<Option<Appointment>, RepositoryError> {
        self.inner.appointment(id)
    }

    fn assignments(&self, id: &ApplicationId) -> Result<Vec<OfficerAssignment>, RepositoryError> {
        self.inner.assignments(id)
    }

    fn record_signature_otp(&self, otp: OtpVerification) -> Result<(), RepositoryError> {
        self.inner.record_signature_otp(otp)
    }

    fn signature_otps(&self, id: &ApplicationId) -> Result<Vec<OtpVerification>, RepositoryError> {
        self.inner.signature_otps(id)
    }

    fn transaction(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PaymentTransaction>, RepositoryError> {
        self.inner.transaction(id)
    }

    fn challan(&self, id: &ApplicationId) -> Result<Option<Challan>, RepositoryError> {
        self.inner.challan(id)
    }
}

/// Store whose every call fails, for the 500 path.
pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ApplicationRepository for UnavailableRepository {
    fn allocate_sequence(&self, _year: i32) -> Result<u32, RepositoryError> {
        offline()
    }

    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        offline()
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        offline()
    }

    fn query(&self, _query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        offline()
    }

    fn commit(&self, _commit: ApplicationCommit) -> Result<ApplicationRecord, RepositoryError> {
        offline()
    }

    fn appointment(&self, _id: &ApplicationId) -> Result<Option<Appointment>, RepositoryError> {
        offline()
    }

    fn assignments(&self, _id: &ApplicationId) -> Result<Vec<OfficerAssignment>, RepositoryError> {
        offline()
    }

    fn record_signature_otp(&self, _otp: OtpVerification) -> Result<(), RepositoryError> {
        offline()
    }

    fn signature_otps(&self, _id: &ApplicationId) -> Result<Vec<OtpVerification>, RepositoryError> {
        offline()
    }

    fn transaction(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<PaymentTransaction>, RepositoryError> {
        offline()
    }

    fn challan(&self, _id: &ApplicationId) -> Result<Option<Challan>, RepositoryError> {
        offline()
    }
}

pub(super) fn appointment_details() -> AppointmentDetails {
    AppointmentDetails {
        review_date: start_time() + Duration::days(3),
        comments: Some("Bring original certificates".to_string()),
        contact_person: "R. Deshpande".to_string(),
        place: "PMC Main Building".to_string(),
        room_number: "204".to_string(),
    }
}
