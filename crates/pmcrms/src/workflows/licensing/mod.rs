//! Licence applications: submission, staged officer review, digital signatures, payment
//! challan and certificate issuance.
//!
//! Every stage change flows through [`transitions::plan`], and every write lands in a
//! single versioned [`ApplicationCommit`] so concurrent officers cannot both advance the
//! same application.

pub mod access;
pub mod certificate;
pub mod challan;
pub mod clock;
pub mod domain;
pub mod memory;
pub mod notifications;
pub mod otp;
pub mod payments;
pub mod repository;
pub mod roles;
pub mod router;
pub mod service;
pub mod signature;
pub mod transitions;
pub mod views;

#[cfg(test)]
mod tests;

pub use certificate::{
    certificate_number, CertificateDraft, CertificateInfo, CertificateRenderer, CertificateService,
};
pub use challan::{
    amount_in_words, ChallanDraft, ChallanReceipt, ChallanRequest, ChallanService, ReceiptRenderer,
    RenderError,
};
pub use clock::{Clock, CodeGenerator, RandomCodeGenerator, SystemClock};
pub use domain::{
    Address, ApplicationForm, ApplicationId, ApplicationNumber, ApplicationRecord,
    ApplicationStage, ApplicationStatus, Appointment, AppointmentDetails, BlobKey, Challan,
    DocumentType, DocumentUpload, Gender, Officer, OfficerAssignment, PositionType, UserAccount,
    UserId,
};
pub use otp::{IssuedOtp, OtpAttemptError, OtpAttemptService};
pub use payments::{
    CallbackChecksum, PaymentCallback, PaymentGateway, PaymentGatewayError, PaymentInitiation,
    PaymentOutcome, PaymentRedirect, PaymentService,
};
pub use repository::{
    ApplicationCommit, ApplicationQuery, ApplicationRepository, DirectoryRepository,
    DocumentDownload, DocumentStore, DocumentStoreError, EmailMessage, NotificationError, Notifier,
    OtpAttemptRepository, QueryScope, RepositoryError,
};
pub use roles::{OfficerLevel, RoleClass, SignaturePlacement};
pub use router::{licensing_router, LicensingApi};
pub use service::{
    LicenceApplicationService, OfficerInvitation, OfficerProvisioning, WorkflowDeps, WorkflowError,
};
pub use signature::{
    HsmClient, OtpSession, SignOutcome, SignatureCoordinator, SignerError, SigningService,
};
pub use transitions::{Edge, EdgeGuard, TransitionTrigger};
pub use views::{ApplicationDetail, ApplicationPage, ApplicationSummary, ListFilter};
