//! Applicant-facing email payloads. Delivery belongs to the [`Notifier`](super::repository::Notifier).

use super::domain::{ApplicationRecord, ApplicationStage, Appointment};
use super::repository::EmailMessage;

/// Wording shown to applicants for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDisplay {
    pub title: &'static str,
    pub message: &'static str,
}

pub fn stage_display(stage: ApplicationStage) -> StageDisplay {
    let (title, message) = match stage {
        ApplicationStage::JuniorEngineerPending => (
            "Junior Engineer Review",
            "Your application is with the Junior Engineer for initial review.",
        ),
        ApplicationStage::DocumentVerificationPending => (
            "Document Verification",
            "Please attend the scheduled appointment with your original documents.",
        ),
        ApplicationStage::AssistantEngineerPending => (
            "Assistant Engineer Review",
            "Your documents were verified and the Assistant Engineer is reviewing your application.",
        ),
        ApplicationStage::ExecutiveEngineerPending => (
            "Executive Engineer Review",
            "Your application is awaiting review by the Executive Engineer.",
        ),
        ApplicationStage::CityEngineerPending => (
            "City Engineer Review",
            "Your application is awaiting review by the City Engineer.",
        ),
        ApplicationStage::PaymentPending => (
            "Payment Pending",
            "Your application was approved for licensing. Please complete the fee payment.",
        ),
        ApplicationStage::ClerkPending => (
            "Administrative Processing",
            "Payment received. The administrative office is processing your licence.",
        ),
        ApplicationStage::ExecutiveEngineerSignPending => (
            "Executive Engineer Signature",
            "Your licence is awaiting the Executive Engineer's digital signature.",
        ),
        ApplicationStage::CityEngineerSignPending => (
            "City Engineer Signature",
            "Your licence is awaiting the City Engineer's digital signature.",
        ),
        ApplicationStage::Approved => (
            "Application Approved",
            "Your licence has been issued. You can download it from the portal.",
        ),
        ApplicationStage::Rejected => (
            "Application Rejected",
            "Your application was rejected. Please see the officer's remarks for details.",
        ),
    };
    StageDisplay { title, message }
}

fn wrap_html(heading: &str, body: &str) -> String {
    format!(
        "<html><body style=\"font-family: Arial, sans-serif;\">\
         <h2 style=\"color:#1f4e79;\">Pune Municipal Corporation</h2>\
         <h3>{heading}</h3>{body}\
         <p style=\"color:#777;font-size:12px;\">This is an automated message. Please do not reply.</p>\
         </body></html>"
    )
}

/// Escapes the handful of characters that matter inside HTML text nodes.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn stage_update_email(
    record: &ApplicationRecord,
    previous: ApplicationStage,
    acted_by: &str,
    comments: Option<&str>,
) -> EmailMessage {
    let current = stage_display(record.stage());
    let before = stage_display(previous);
    let mut body = format!(
        "<p>Dear {name},</p>\
         <p>Application <strong>{number}</strong> moved from <em>{before}</em> to \
         <strong>{after}</strong>. Updated by: {acted_by}.</p><p>{message}</p>",
        name = escape(&record.applicant.full_name()),
        number = record.number,
        before = before.title,
        after = current.title,
        acted_by = escape(acted_by),
        message = current.message,
    );
    if let Some(comments) = comments.filter(|text| !text.trim().is_empty()) {
        body.push_str(&format!("<p>Remarks: {}</p>", escape(comments)));
    }
    EmailMessage {
        to: record.applicant.email_address.clone(),
        subject: format!("Application {} - {}", record.number, current.title),
        html_body: wrap_html(current.title, &body),
    }
}

pub fn appointment_email(record: &ApplicationRecord, appointment: &Appointment) -> EmailMessage {
    let mut body = format!(
        "<p>Dear {name},</p>\
         <p>A document verification appointment was scheduled for application \
         <strong>{number}</strong>.</p>\
         <ul><li>Date: {date}</li><li>Place: {place}</li><li>Room: {room}</li>\
         <li>Contact person: {contact}</li></ul>",
        name = escape(&record.applicant.full_name()),
        number = record.number,
        date = appointment.scheduled_for.format("%d %B %Y %H:%M UTC"),
        place = escape(&appointment.place),
        room = escape(&appointment.room_number),
        contact = escape(&appointment.contact_person),
    );
    if let Some(comments) = appointment.comments.as_deref() {
        body.push_str(&format!("<p>{}</p>", escape(comments)));
    }
    EmailMessage {
        to: record.applicant.email_address.clone(),
        subject: format!("Appointment scheduled for application {}", record.number),
        html_body: wrap_html("Document Verification Appointment", &body),
    }
}

pub fn login_otp_email(email: &str, otp: &str, valid_minutes: i64) -> EmailMessage {
    let body = format!(
        "<p>Your verification code is <strong>{otp}</strong>.</p>\
         <p>The code is valid for {valid_minutes} minutes.</p>"
    );
    EmailMessage {
        to: email.to_string(),
        subject: "PMC verification code".to_string(),
        html_body: wrap_html("Verification Code", &body),
    }
}

pub fn officer_invitation_email(email: &str, role: &str) -> EmailMessage {
    let body = format!(
        "<p>You have been invited to the PMC licence portal as <strong>{}</strong>.</p>\
         <p>Sign in with a verification code sent to this address to activate your account.</p>",
        escape(role)
    );
    EmailMessage {
        to: email.to_string(),
        subject: "Welcome to PMC - Account Setup".to_string(),
        html_body: wrap_html("Officer Invitation", &body),
    }
}
