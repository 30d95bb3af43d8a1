use std::collections::BTreeSet;
use std::sync::Arc;

use super::common::*;
use crate::workflows::licensing::domain::{
    ApplicationId, ApplicationStage, ApplicationStatus, PositionType, UserId,
};
use crate::workflows::licensing::repository::{
    ApplicationCommit, ApplicationRepository, RepositoryError,
};
use crate::workflows::licensing::service::{
    LicenceApplicationService, OfficerInvitation, OfficerProvisioning, WorkflowDeps,
    WorkflowError,
};
use crate::workflows::licensing::transitions;
use crate::workflows::licensing::views::ListFilter;

#[test]
fn submission_starts_at_junior_review_with_linked_documents() {
    let h = harness();
    let applicant = h.applicant("asha");

    let record = h.submit(&applicant, PositionType::Architect);

    assert_eq!(record.stage(), ApplicationStage::JuniorEngineerPending);
    assert_eq!(record.status(), ApplicationStatus::Submitted);
    assert_eq!(record.number.to_string(), "PMC_APPLICATION_2025_1");
    let degree = record
        .documents
        .iter()
        .find(|doc| doc.file_name == "degree.pdf")
        .expect("degree document kept");
    assert_eq!(degree.qualification_id, Some(record.qualifications[0].id));
    assert_eq!(degree.experience_id, None);
    let experience = record
        .documents
        .iter()
        .find(|doc| doc.file_name == "experience.pdf")
        .expect("experience document kept");
    assert_eq!(experience.experience_id, Some(record.experiences[0].id));
    let pan = record
        .documents
        .iter()
        .find(|doc| doc.file_name == "pan.pdf")
        .expect("pan document kept");
    assert_eq!((pan.qualification_id, pan.experience_id), (None, None));
}

#[test]
fn submission_requires_a_known_applicant_and_contact_details() {
    let h = harness();
    match h
        .api
        .applications
        .create_application(form(PositionType::Architect), &UserId::new("ghost"))
    {
        Err(WorkflowError::NotFound { entity, .. }) => assert_eq!(entity, "user"),
        other => panic!("expected missing user, got {other:?}"),
    }

    let applicant = h.applicant("asha");
    let mut incomplete = form(PositionType::Architect);
    incomplete.email_address = "not-an-email".to_string();
    match h.api.applications.create_application(incomplete, &applicant) {
        Err(WorkflowError::Validation(message)) => assert!(message.contains("not-an-email")),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn sequential_submissions_get_increasing_numbers() {
    let h = harness();
    let applicant = h.applicant("asha");

    let sequences: Vec<u32> = (0..5)
        .map(|_| h.submit(&applicant, PositionType::Supervisor1).number.sequence)
        .collect();

    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[test]
fn concurrent_submissions_never_share_a_number() {
    let h = harness();
    let applicant = h.applicant("asha");

    let numbers: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| h.submit(&applicant, PositionType::Architect).number.sequence))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("submission thread"))
            .collect()
    });

    let distinct: BTreeSet<u32> = numbers.iter().copied().collect();
    assert_eq!(distinct.len(), numbers.len());
    assert_eq!(distinct.into_iter().collect::<Vec<_>>(), (1..=8).collect::<Vec<_>>());
}

#[test]
fn appointment_scheduling_moves_to_document_verification() {
    let h = harness();
    let applicant = h.applicant("asha");
    let junior = h.officer("je-arch", "JuniorArchitect");
    let record = h.submit(&applicant, PositionType::Architect);

    let appointment = h
        .api
        .applications
        .schedule_appointment(&record.id, appointment_details(), &junior)
        .expect("junior schedules");

    let stored = h.record(&record.id);
    assert_eq!(stored.stage(), ApplicationStage::DocumentVerificationPending);
    assert_eq!(stored.status(), ApplicationStatus::AppointmentScheduled);
    assert_eq!(
        h.applications.appointment(&record.id).expect("readable"),
        Some(appointment.clone())
    );
    let assignments = h.applications.assignments(&record.id).expect("readable");
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].stage, ApplicationStage::JuniorEngineerPending);
    assert!(h
        .outbox
        .sent()
        .iter()
        .any(|mail| mail.to == "asha@example.in" && mail.html_body.contains("PMC Main Building")));

    match h
        .api
        .applications
        .schedule_appointment(&record.id, appointment_details(), &junior)
    {
        Err(WorkflowError::InvalidTransition(_)) => {}
        other => panic!("expected second scheduling to be refused, got {other:?}"),
    }
}

#[test]
fn officer_decision_cannot_skip_the_appointment() {
    let h = harness();
    let applicant = h.applicant("asha");
    let junior = h.officer("je-arch", "JuniorArchitect");
    let record = h.submit(&applicant, PositionType::Architect);

    match h.api.applications.update_stage(
        &record.id,
        ApplicationStage::DocumentVerificationPending,
        &junior,
        None,
    ) {
        Err(WorkflowError::InvalidTransition(_)) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
    assert_eq!(
        h.record(&record.id).stage(),
        ApplicationStage::JuniorEngineerPending
    );
    assert_eq!(h.applications.appointment(&record.id).expect("readable"), None);
}

#[test]
fn appointment_by_another_category_is_refused() {
    let h = harness();
    let applicant = h.applicant("asha");
    let structural = h.officer("je-struct", "JuniorStructuralEngineer");
    let record = h.submit(&applicant, PositionType::Architect);

    match h
        .api
        .applications
        .schedule_appointment(&record.id, appointment_details(), &structural)
    {
        Err(WorkflowError::Unauthorized(_)) => {}
        other => panic!("expected category mismatch, got {other:?}"),
    }
    assert_eq!(
        h.record(&record.id).stage(),
        ApplicationStage::JuniorEngineerPending
    );
    assert_eq!(h.applications.appointment(&record.id).expect("readable"), None);
}

#[test]
fn city_engineer_cannot_act_during_document_verification() {
    let h = harness();
    let applicant = h.applicant("asha");
    let junior = h.officer("je-arch", "JuniorArchitect");
    let city = h.officer("ce", "CityEngineer");
    let record = h.submit(&applicant, PositionType::Architect);
    h.api
        .applications
        .schedule_appointment(&record.id, appointment_details(), &junior)
        .expect("junior schedules");

    match h.api.applications.update_stage(
        &record.id,
        ApplicationStage::AssistantEngineerPending,
        &city,
        None,
    ) {
        Err(WorkflowError::Unauthorized(_)) => {}
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert_eq!(
        h.record(&record.id).stage(),
        ApplicationStage::DocumentVerificationPending
    );
}

#[test]
fn final_approval_happens_once() {
    let h = harness();
    let applicant = h.applicant("asha");
    let city = h.officer("ce", "CityEngineer");
    let record = h.submit(&applicant, PositionType::LicenceEngineer);
    h.force_stage(&record.id, ApplicationStage::CityEngineerSignPending);

    let approved = h
        .api
        .applications
        .update_stage(&record.id, ApplicationStage::Approved, &city, None)
        .expect("city engineer approves");
    assert_eq!(approved.stage(), ApplicationStage::Approved);
    assert_eq!(approved.status(), ApplicationStatus::Completed);
    assert_eq!(approved.workflow.approval_date, Some(start_time()));

    match h
        .api
        .applications
        .update_stage(&record.id, ApplicationStage::Approved, &city, None)
    {
        Err(WorkflowError::InvalidTransition(_)) => {}
        other => panic!("expected terminal refusal, got {other:?}"),
    }
}

#[test]
fn stage_owners_cannot_take_undeclared_edges() {
    let h = harness();
    let applicant = h.applicant("asha");
    let owners = [
        (ApplicationStage::DocumentVerificationPending, h.officer("je", "JuniorArchitect")),
        (ApplicationStage::AssistantEngineerPending, h.officer("ae", "AssistantArchitect")),
        (ApplicationStage::ExecutiveEngineerPending, h.officer("ee", "ExecutiveEngineer")),
        (ApplicationStage::CityEngineerPending, h.officer("ce", "CityEngineer")),
        (ApplicationStage::ClerkPending, h.officer("clerk", "Clerk")),
    ];

    for (stage, owner) in &owners {
        let allowed = transitions::officer_targets(*stage);
        for target in ApplicationStage::ALL {
            if allowed.contains(&target) {
                continue;
            }
            let record = h.submit(&applicant, PositionType::Architect);
            h.force_stage(&record.id, *stage);
            match h.api.applications.update_stage(&record.id, target, owner, None) {
                Err(WorkflowError::InvalidTransition(_)) => {}
                other => panic!("expected {stage} -> {target} to be invalid, got {other:?}"),
            }
            assert_eq!(h.record(&record.id).stage(), *stage);
        }
    }
}

#[test]
fn any_owner_may_reject_before_completion() {
    let h = harness();
    let applicant = h.applicant("asha");
    let assistant = h.officer("ae", "AssistantArchitect");
    let record = h.submit(&applicant, PositionType::Architect);
    h.force_stage(&record.id, ApplicationStage::AssistantEngineerPending);

    let rejected = h
        .api
        .applications
        .update_stage(
            &record.id,
            ApplicationStage::Rejected,
            &assistant,
            Some("Experience certificate unreadable".to_string()),
        )
        .expect("assistant rejects");

    assert_eq!(rejected.status(), ApplicationStatus::Rejected);
    let assignments = h.applications.assignments(&record.id).expect("readable");
    assert_eq!(
        assignments[0].comments.as_deref(),
        Some("Experience certificate unreadable")
    );
    let mail = h.outbox.sent().pop().expect("rejection mailed");
    assert!(mail.html_body.contains("Experience certificate unreadable"));
}

#[test]
fn stale_writers_get_a_conflict() {
    let h = harness();
    let applicant = h.applicant("asha");
    let assistant = h.officer("ae", "AssistantArchitect");
    let record = h.submit(&applicant, PositionType::Architect);
    h.force_stage(&record.id, ApplicationStage::AssistantEngineerPending);

    let stale = h.stale_api();

    stale
        .applications
        .update_stage(
            &record.id,
            ApplicationStage::ExecutiveEngineerPending,
            &assistant,
            None,
        )
        .expect("first write lands");
    let second = stale
        .applications
        .update_stage(&record.id, ApplicationStage::Rejected, &assistant, None);
    match second {
        Err(WorkflowError::Conflict(_)) => {}
        other => panic!("expected version conflict, got {other:?}"),
    }
    assert_eq!(
        h.record(&record.id).stage(),
        ApplicationStage::ExecutiveEngineerPending
    );
}

#[test]
fn repository_refuses_outdated_versions() {
    let h = harness();
    let applicant = h.applicant("asha");
    let record = h.submit(&applicant, PositionType::Architect);
    let snapshot = h.record(&record.id);
    h.force_stage(&record.id, ApplicationStage::Rejected);

    let outdated = snapshot.version;
    match h.applications.commit(ApplicationCommit::new(snapshot, outdated)) {
        Err(RepositoryError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn mail_outage_does_not_fail_the_transition() {
    let h = harness_with_notifier(Some(Arc::new(FailingNotifier)));
    let applicant = h.applicant("asha");
    let executive = h.officer("ee", "ExecutiveEngineer");
    let record = h.submit(&applicant, PositionType::StructuralEngineer);
    h.force_stage(&record.id, ApplicationStage::ExecutiveEngineerPending);

    let moved = h
        .api
        .applications
        .update_stage(
            &record.id,
            ApplicationStage::CityEngineerPending,
            &executive,
            None,
        )
        .expect("transition survives mail failure");
    assert_eq!(moved.stage(), ApplicationStage::CityEngineerPending);
}

#[test]
fn officers_see_only_their_stages_and_category() {
    let h = harness();
    let applicant = h.applicant("asha");
    let other_applicant = h.applicant("ravi");
    let architect_junior = h.officer("je-arch", "JuniorArchitect");
    let structural_junior = h.officer("je-struct", "JuniorStructuralEngineer");
    let executive = h.officer("ee", "ExecutiveEngineer");
    let admin = h.officer("admin", "Admin");

    let architect = h.submit(&applicant, PositionType::Architect);
    let structural = h.submit(&other_applicant, PositionType::StructuralEngineer);
    let escalated = h.submit(&other_applicant, PositionType::Supervisor2);
    h.force_stage(&escalated.id, ApplicationStage::ExecutiveEngineerPending);

    let ids = |user: &UserId| -> Vec<_> {
        h.api
            .applications
            .list_applications(user, &ListFilter::default())
            .expect("list succeeds")
            .items
            .into_iter()
            .map(|item| item.id)
            .collect()
    };

    assert_eq!(ids(&architect_junior), vec![architect.id]);
    assert_eq!(ids(&structural_junior), vec![structural.id]);
    assert_eq!(ids(&executive), vec![escalated.id]);
    assert!(ids(&admin).is_empty());
    assert_eq!(ids(&applicant), vec![architect.id]);
    assert_eq!(ids(&other_applicant).len(), 2);
}

#[test]
fn listing_filters_by_name_and_pages() {
    let h = harness();
    let applicant = h.applicant("asha");
    for (first, last) in [("Asha", "Kulkarni"), ("Meera", "Joshi"), ("Asha", "Patil")] {
        h.api
            .applications
            .create_application(named_form(PositionType::Architect, first, last), &applicant)
            .expect("submits");
    }

    let by_name = h
        .api
        .applications
        .list_applications(
            &applicant,
            &ListFilter {
                applicant_name: Some("asha".to_string()),
                ..ListFilter::default()
            },
        )
        .expect("list succeeds");
    assert_eq!(by_name.items.len(), 2);

    let second_page = h
        .api
        .applications
        .list_applications(
            &applicant,
            &ListFilter {
                page: Some(2),
                page_size: Some(2),
                ..ListFilter::default()
            },
        )
        .expect("list succeeds");
    assert_eq!(second_page.page, 2);
    assert_eq!(second_page.items.len(), 1);
}

#[test]
fn detail_is_limited_to_owner_and_stage_officers() {
    let h = harness();
    let applicant = h.applicant("asha");
    let stranger = h.applicant("ravi");
    let junior = h.officer("je-arch", "JuniorArchitect");
    let assistant = h.officer("ae-arch", "AssistantArchitect");
    let record = h.submit(&applicant, PositionType::Architect);

    let detail = h
        .api
        .applications
        .get_application(&record.id, &applicant)
        .expect("owner reads");
    assert_eq!(detail.current_stage, ApplicationStage::JuniorEngineerPending);
    assert!(h
        .api
        .applications
        .get_application(&record.id, &junior)
        .is_ok());

    for outsider in [&stranger, &assistant] {
        match h.api.applications.get_application(&record.id, outsider) {
            Err(WorkflowError::Unauthorized(_)) => {}
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    let missing = ApplicationId::generate();
    match h.api.applications.get_application(&missing, &applicant) {
        Err(WorkflowError::NotFound { .. }) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn officer_provisioning_is_idempotent_and_staff_only() {
    let h = harness();
    let clerk = h.officer("clerk", "Clerk");

    let again = h
        .api
        .applications
        .provision_officer(
            &clerk,
            OfficerProvisioning {
                first_name: "Other".to_string(),
                last_name: "Name".to_string(),
                phone_number: None,
                key_label: None,
            },
        )
        .expect("repeat provisioning");
    assert_eq!(again.first_name, "clerk");
    assert_eq!(again.key_label, "CLERK_KEY");

    let applicant = h.applicant("asha");
    match h.api.applications.provision_officer(
        &applicant,
        crate::workflows::licensing::service::OfficerProvisioning {
            first_name: "Asha".to_string(),
            last_name: "Kulkarni".to_string(),
            phone_number: None,
            key_label: None,
        },
    ) {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected applicants to be refused, got {other:?}"),
    }
}

#[test]
fn recommended_form_requires_stage_ownership() {
    let h = harness();
    let applicant = h.applicant("asha");
    let junior = h.officer("je-arch", "JuniorArchitect");
    let executive = h.officer("ee", "ExecutiveEngineer");
    let record = h.submit(&applicant, PositionType::Architect);

    match h
        .api
        .applications
        .attach_recommended_form(&record.id, &executive, b"%PDF")
    {
        Err(WorkflowError::Unauthorized(_)) => {}
        other => panic!("expected unauthorized, got {other:?}"),
    }
    match h.api.applications.attach_recommended_form(&record.id, &junior, b"") {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected empty form to be refused, got {other:?}"),
    }

    let stored = h
        .api
        .applications
        .attach_recommended_form(&record.id, &junior, b"%PDF-1.7")
        .expect("junior attaches");
    assert!(stored.workflow.recommended_form.is_some());
    assert_eq!(stored.stage(), ApplicationStage::JuniorEngineerPending);
    assert_eq!(stored.workflow.last_modified_by, Some(junior));
}

#[test]
fn store_outage_surfaces_as_repository_error() {
    let h = harness();
    let applicant = h.applicant("asha");
    let offline = LicenceApplicationService::new(WorkflowDeps {
        applications: Arc::new(UnavailableRepository),
        ..h.deps.clone()
    });

    match offline.create_application(form(PositionType::Architect), &applicant) {
        Err(WorkflowError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository failure, got {other:?}"),
    }
}

#[test]
fn first_sign_in_registers_an_applicant_once() {
    let h = harness();

    let account = h
        .api
        .applications
        .register_applicant("  Asha@Example.IN ")
        .expect("applicant registers");
    assert_eq!(account.id, UserId::new("asha@example.in"));
    assert_eq!(account.role, "User");
    assert!(account.is_active);

    let again = h
        .api
        .applications
        .register_applicant("asha@example.in")
        .expect("returning applicant");
    assert_eq!(again, account);

    let record = h
        .api
        .applications
        .create_application(form(PositionType::Architect), &account.id)
        .expect("registered applicant submits");
    assert!(record.is_owned_by(&account.id));

    match h.api.applications.register_applicant("not-an-address") {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn admins_invite_officers_by_email() {
    let h = harness();
    let admin = h.register("admin", "Admin");
    let applicant = h.applicant("asha");
    let invitation = OfficerInvitation {
        email: "Meera.Joshi@pmc.gov.in".to_string(),
        role: "JuniorStructuralEngineer".to_string(),
    };

    match h
        .api
        .applications
        .invite_officer(&applicant, invitation.clone())
    {
        Err(WorkflowError::Unauthorized(_)) => {}
        other => panic!("expected unauthorized, got {other:?}"),
    }

    let invited = h
        .api
        .applications
        .invite_officer(&admin, invitation.clone())
        .expect("admin invites");
    assert_eq!(invited.email, "meera.joshi@pmc.gov.in");
    assert_eq!(invited.role, "JuniorStructuralEngineer");
    let mail = h
        .outbox
        .sent()
        .into_iter()
        .find(|mail| mail.to == invited.email)
        .expect("invitation mailed");
    assert_eq!(mail.subject, "Welcome to PMC - Account Setup");

    match h.api.applications.invite_officer(&admin, invitation) {
        Err(WorkflowError::Conflict(_)) => {}
        other => panic!("expected duplicate to conflict, got {other:?}"),
    }
    match h.api.applications.invite_officer(
        &admin,
        OfficerInvitation {
            email: "someone@pmc.gov.in".to_string(),
            role: "User".to_string(),
        },
    ) {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected non-officer role to be refused, got {other:?}"),
    }

    let signed_in = h
        .api
        .applications
        .register_applicant("meera.joshi@pmc.gov.in")
        .expect("invited officer signs in");
    assert_eq!(signed_in.role, "JuniorStructuralEngineer");
}
