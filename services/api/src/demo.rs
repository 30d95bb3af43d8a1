use crate::infra::{
    licensing_api, sandbox_payment, seed_staff, HostedCheckoutGateway, Platform, SandboxSigner,
    DEMO_PORTAL_URL,
};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use pmcrms::error::AppError;
use pmcrms::workflows::licensing::memory::{
    InMemoryDirectory, InMemoryDocumentStore, OutboxNotifier,
};
use pmcrms::workflows::licensing::{
    Address, ApplicationForm, ApplicationId, ApplicationStage, AppointmentDetails, Gender,
    LicensingApi, PaymentCallback, PaymentOutcome, PositionType, UserAccount, UserId,
    WorkflowError,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Licence category to apply for (Architect, StructuralEngineer, LicenceEngineer,
    /// Supervisor1, Supervisor2). Defaults to Architect.
    #[arg(long, value_parser = parse_category)]
    pub(crate) category: Option<PositionType>,
    /// Licence fee in rupees. Defaults to 3000.
    #[arg(long)]
    pub(crate) fee: Option<u64>,
    /// Print every email the workflow sent.
    #[arg(long)]
    pub(crate) show_mail: bool,
}

pub(crate) fn parse_category(raw: &str) -> Result<PositionType, String> {
    let wanted = raw.trim();
    PositionType::ALL
        .into_iter()
        .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| format!("'{raw}' is not a licence category"))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        category,
        fee,
        show_mail,
    } = args;
    let category = category.unwrap_or(PositionType::Architect);
    let outbox = OutboxNotifier::default();
    let platform = Platform {
        directory: InMemoryDirectory::new(),
        documents: Arc::new(InMemoryDocumentStore::default()),
        notifier: Arc::new(outbox.clone()),
    };
    let payment = sandbox_payment(fee.unwrap_or(3000));
    let gateway = HostedCheckoutGateway::new(&payment, DEMO_PORTAL_URL);
    let callback = HostedCheckoutGateway::new(&payment, DEMO_PORTAL_URL);
    let api = licensing_api(&platform, SandboxSigner, gateway, payment.fee);
    seed_staff(&platform, &api)?;

    println!("PMC licence workflow demo ({category})");
    let applicant = UserId::new("asha");
    platform
        .directory
        .register_user(UserAccount {
            id: applicant.clone(),
            email: "asha@example.in".to_string(),
            role: "User".to_string(),
            is_active: true,
        })
        .map_err(WorkflowError::from)?;

    let record = api
        .applications
        .create_application(demo_form(category), &applicant)?;
    let id = record.id;
    println!("- Submitted {} -> {}", record.number, record.stage());

    let slug = category.as_str().to_ascii_lowercase();
    let junior = UserId::new(format!("je-{slug}"));
    let assistant = UserId::new(format!("ae-{slug}"));
    let executive = UserId::new("ee");
    let city = UserId::new("ce");
    let clerk = UserId::new("clerk");

    let appointment = api.applications.schedule_appointment(
        &id,
        AppointmentDetails {
            review_date: Utc::now() + Duration::days(3),
            comments: Some("Bring original certificates".to_string()),
            contact_person: "Document desk".to_string(),
            place: "PMC Main Building".to_string(),
            room_number: "104".to_string(),
        },
        &junior,
    )?;
    println!(
        "- {junior} scheduled document verification for {}",
        appointment.scheduled_for.format("%d %b %Y %H:%M")
    );

    for (officer, target) in [
        (&junior, ApplicationStage::AssistantEngineerPending),
        (&assistant, ApplicationStage::ExecutiveEngineerPending),
        (&executive, ApplicationStage::CityEngineerPending),
        (&city, ApplicationStage::PaymentPending),
    ] {
        let moved = api.applications.update_stage(&id, target, officer, None)?;
        println!("- {officer} advanced to {} ({:?})", moved.stage(), moved.status());
    }

    let redirect = api.payments.initiate_payment(&id, &applicant).await?;
    println!(
        "- Checkout {} opened at {}",
        redirect.order_id, redirect.redirect_url
    );
    let body = callback.seal(&PaymentCallback {
        order_id: redirect.order_id,
        status: "Success".to_string(),
        amount: redirect.parameters.get("amount").cloned(),
        mode: Some("UPI".to_string()),
        card_type: None,
        error_message: None,
    });
    let outcome = api.payments.complete_payment(&id, body.as_bytes())?;
    match &outcome {
        PaymentOutcome::Completed {
            stage,
            challan_number,
        } => println!(
            "- Payment confirmed -> {stage}, challan {}",
            challan_number.as_deref().unwrap_or("pending")
        ),
        PaymentOutcome::AlreadyCompleted => println!("- Payment was already recorded"),
        PaymentOutcome::Failed { reason } => {
            println!("- Payment failed: {reason}");
            return Ok(());
        }
    }

    api.applications.update_stage(
        &id,
        ApplicationStage::ExecutiveEngineerSignPending,
        &clerk,
        None,
    )?;
    println!("- {clerk} forwarded the file for signatures");

    api.applications
        .attach_recommended_form(&id, &executive, b"%PDF-1.7 recommended licence form")?;
    sign(&api, &id, &executive).await?;
    sign(&api, &id, &city).await?;

    let certificate = api.certificates.generate(&id, &city)?;
    println!(
        "- {city} issued certificate {}",
        certificate.certificate_number
    );

    let detail = api.applications.get_application(&id, &applicant)?;
    println!(
        "- Final state {} ({:?}), {} officer assignments recorded",
        detail.current_stage,
        detail.status,
        detail.assignments.len()
    );

    let mails = outbox.sent();
    println!("- {} emails sent to the applicant", mails.len());
    if show_mail {
        for mail in mails {
            println!("    {} | {}", mail.to, mail.subject);
        }
    }

    Ok(())
}

async fn sign(
    api: &LicensingApi<SandboxSigner, HostedCheckoutGateway>,
    id: &ApplicationId,
    officer: &UserId,
) -> Result<(), AppError> {
    let session = api.signatures.generate_otp(id, officer).await?;
    let signed = api.signatures.apply_signature(id, "123456", officer).await?;
    println!(
        "- {officer} signed (otp {} valid until {}) -> {}",
        session.otp_id,
        session.expires_at.format("%H:%M"),
        signed.stage()
    );
    Ok(())
}

fn demo_form(category: PositionType) -> ApplicationForm {
    let address = Address {
        address_line1: "14 Fergusson College Road".to_string(),
        address_line2: None,
        address_line3: None,
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        country: "India".to_string(),
        pin_code: "411004".to_string(),
    };

    ApplicationForm {
        first_name: "Asha".to_string(),
        middle_name: None,
        last_name: "Kulkarni".to_string(),
        mother_name: None,
        mobile_number: "9820000000".to_string(),
        email_address: "asha@example.in".to_string(),
        position_type: category,
        blood_group: None,
        height_cm: None,
        gender: Gender::Female,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 18).unwrap_or_default(),
        permanent_address: address.clone(),
        current_address: address,
        pan_card_number: None,
        aadhar_card_number: None,
        coa_card_number: None,
        qualifications: Vec::new(),
        experiences: Vec::new(),
        documents: Vec::new(),
    }
}
