use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::certificate::CertificateService;
use super::challan::{ChallanRequest, ChallanService};
use super::domain::{ApplicationForm, ApplicationId, ApplicationStage, AppointmentDetails, UserId};
use super::otp::{OtpAttemptError, OtpAttemptService};
use super::payments::{PaymentGateway, PaymentService};
use super::repository::DocumentDownload;
use super::service::{
    LicenceApplicationService, OfficerInvitation, OfficerProvisioning, WorkflowError,
};
use super::signature::{SignatureCoordinator, SigningService};
use super::views::ListFilter;

/// Header carrying the authenticated caller, set by the upstream identity proxy.
pub const CALLER_HEADER: &str = "x-user-id";

/// Services exposed over HTTP.
pub struct LicensingApi<S, P> {
    pub applications: LicenceApplicationService,
    pub signatures: SignatureCoordinator<S>,
    pub payments: PaymentService<P>,
    pub challans: Arc<ChallanService>,
    pub certificates: CertificateService,
    pub otp: OtpAttemptService,
}

/// Router builder exposing the licence workflow under `/api/v1`.
pub fn licensing_router<S, P>(api: Arc<LicensingApi<S, P>>) -> Router
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_handler::<S, P>).get(list_handler::<S, P>),
        )
        .route("/api/v1/applications/:application_id", get(detail_handler::<S, P>))
        .route(
            "/api/v1/applications/:application_id/stage",
            post(update_stage_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/appointment",
            post(appointment_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/recommended-form",
            post(recommended_form_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/signature/otp",
            post(signature_otp_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/signature",
            post(apply_signature_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/payment",
            post(initiate_payment_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/payment/callback",
            post(payment_callback_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/challan",
            post(generate_challan_handler::<S, P>).get(challan_download_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/certificate",
            post(generate_certificate_handler::<S, P>).get(certificate_download_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/certificate/info",
            get(certificate_info_handler::<S, P>),
        )
        .route("/api/v1/officers", post(provision_officer_handler::<S, P>))
        .route(
            "/api/v1/officers/invitations",
            post(invite_officer_handler::<S, P>),
        )
        .route("/api/v1/otp/login", post(issue_login_otp_handler::<S, P>))
        .route(
            "/api/v1/otp/login/verify",
            post(verify_login_otp_handler::<S, P>),
        )
        .with_state(api)
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn workflow_error_response(error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::Unauthorized(_) => StatusCode::FORBIDDEN,
        WorkflowError::InvalidTransition(_) | WorkflowError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::Configuration(_) | WorkflowError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, error.to_string())
}

fn document_response(download: DocumentDownload) -> Response {
    let content_type = [(header::CONTENT_TYPE, download.media_type.to_string())];
    (StatusCode::OK, content_type, download.bytes).into_response()
}

/// Authenticated caller or a ready-made 401.
fn caller(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::new)
        .ok_or_else(|| {
            error_body(
                StatusCode::UNAUTHORIZED,
                format!("missing {CALLER_HEADER} header"),
            )
        })
}

fn application_id(raw: &str) -> Result<ApplicationId, Response> {
    raw.parse().map_err(|_| {
        error_body(
            StatusCode::BAD_REQUEST,
            format!("'{raw}' is not an application id"),
        )
    })
}

macro_rules! try_response {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}

pub(crate) async fn create_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Json(form): Json<ApplicationForm>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    match api.applications.create_application(form, &user) {
        Ok(record) => {
            let payload = json!({
                "id": record.id,
                "application_number": record.number,
                "current_stage": record.stage(),
                "status": record.status(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn list_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Query(filter): Query<ListFilter>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    match api.applications.list_applications(&user, &filter) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn detail_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.applications.get_application(&id, &user) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StageUpdateBody {
    new_stage: ApplicationStage,
    #[serde(default)]
    comments: Option<String>,
}

pub(crate) async fn update_stage_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Json(body): Json<StageUpdateBody>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api
        .applications
        .update_stage(&id, body.new_stage, &user, body.comments)
    {
        Ok(record) => {
            let payload = json!({
                "id": record.id,
                "current_stage": record.stage(),
                "status": record.status(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn appointment_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Json(details): Json<AppointmentDetails>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.applications.schedule_appointment(&id, details, &user) {
        Ok(appointment) => (StatusCode::CREATED, Json(appointment)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn recommended_form_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.applications.attach_recommended_form(&id, &user, &body) {
        Ok(record) => {
            let payload = json!({
                "id": record.id,
                "has_recommended_form": record.workflow.recommended_form.is_some(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn signature_otp_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.signatures.generate_otp(&id, &user).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignatureBody {
    otp: String,
}

pub(crate) async fn apply_signature_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Json(body): Json<SignatureBody>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.signatures.apply_signature(&id, &body.otp, &user).await {
        Ok(record) => {
            let payload = json!({
                "id": record.id,
                "current_stage": record.stage(),
                "status": record.status(),
                "is_digitally_signed": record.workflow.signature.is_digitally_signed,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn initiate_payment_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.payments.initiate_payment(&id, &user).await {
        Ok(redirect) => (StatusCode::OK, Json(redirect)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

/// Posted by the gateway, not the applicant; the gateway's checksum stands in for a caller.
pub(crate) async fn payment_callback_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let id = try_response!(application_id(&raw_id));
    match api.payments.complete_payment(&id, &body) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn generate_challan_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    body: Option<Json<ChallanRequest>>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    let request = body.map(|Json(request)| request).unwrap_or_default();
    match api.challans.generate_for(&id, &user, request) {
        Ok(receipt) if receipt.newly_generated => {
            (StatusCode::CREATED, Json(receipt)).into_response()
        }
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn challan_download_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.challans.download_challan(&id, &user) {
        Ok(download) => document_response(download),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn generate_certificate_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.certificates.generate(&id, &user) {
        Ok(info) if info.newly_generated => (StatusCode::CREATED, Json(info)).into_response(),
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn certificate_info_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.certificates.info(&id, &user) {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn certificate_download_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    let id = try_response!(application_id(&raw_id));
    match api.certificates.download(&id, &user) {
        Ok(download) => document_response(download),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn provision_officer_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Json(profile): Json<OfficerProvisioning>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    match api.applications.provision_officer(&user, profile) {
        Ok(officer) => (StatusCode::OK, Json(officer)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn invite_officer_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    headers: HeaderMap,
    Json(invitation): Json<OfficerInvitation>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let user = try_response!(caller(&headers));
    match api.applications.invite_officer(&user, invitation) {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

fn otp_error_response(error: OtpAttemptError) -> Response {
    let status = match &error {
        OtpAttemptError::Blocked { .. } => StatusCode::TOO_MANY_REQUESTS,
        OtpAttemptError::MissingEmail => StatusCode::BAD_REQUEST,
        OtpAttemptError::Delivery(_) => StatusCode::BAD_GATEWAY,
        OtpAttemptError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, error.to_string())
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginOtpBody {
    email: String,
    #[serde(default)]
    otp: Option<String>,
}

pub(crate) async fn issue_login_otp_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    Json(body): Json<LoginOtpBody>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    match api.otp.issue(&body.email) {
        Ok(issued) => (StatusCode::ACCEPTED, Json(issued)).into_response(),
        Err(error) => otp_error_response(error),
    }
}

pub(crate) async fn verify_login_otp_handler<S, P>(
    State(api): State<Arc<LicensingApi<S, P>>>,
    Json(body): Json<LoginOtpBody>,
) -> Response
where
    S: SigningService + 'static,
    P: PaymentGateway + 'static,
{
    let otp = body.otp.unwrap_or_default();
    match api.otp.verify(&body.email, &otp) {
        Ok(true) => match api.applications.register_applicant(&body.email) {
            Ok(account) => {
                let payload = json!({
                    "verified": true,
                    "user_id": account.id,
                    "role": account.role,
                });
                (StatusCode::OK, Json(payload)).into_response()
            }
            Err(error) => workflow_error_response(error),
        },
        Ok(false) => (StatusCode::OK, Json(json!({ "verified": false }))).into_response(),
        Err(error) => otp_error_response(error),
    }
}
