//! Login OTP throttle, keyed by email and independent of stage authorization.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::clock::{Clock, CodeGenerator};
use super::domain::LoginOtpAttempt;
use super::notifications;
use super::repository::{NotificationError, Notifier, OtpAttemptRepository, RepositoryError};

pub const LOGIN_OTP_DIGITS: usize = 4;
pub const LOGIN_OTP_VALID_MINUTES: i64 = 10;
pub const MAX_RETRIES: u32 = 10;
const BLOCK_WINDOW_HOURS: i64 = 24;
const RESEND_WINDOW_MINUTES: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum OtpAttemptError {
    #[error("account blocked for a day after too many OTP requests; try again after {until}")]
    Blocked { until: DateTime<Utc> },
    #[error("email address is required")]
    MissingEmail,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Delivery(#[from] NotificationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedOtp {
    pub expires_at: DateTime<Utc>,
    pub retry_count: u32,
}

pub struct OtpAttemptService {
    attempts: Arc<dyn OtpAttemptRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
}

impl OtpAttemptService {
    pub fn new(
        attempts: Arc<dyn OtpAttemptRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            attempts,
            notifier,
            clock,
            codes,
        }
    }

    /// Issue a code and email it. A resend within a minute still counts against the budget.
    pub fn issue(&self, email: &str) -> Result<IssuedOtp, OtpAttemptError> {
        let email = normalize(email)?;
        let now = self.clock.now();
        let otp = self.codes.digits(LOGIN_OTP_DIGITS);

        let attempt = match self.attempts.find(&email)? {
            Some(existing)
                if existing.retry_count >= MAX_RETRIES
                    && now < existing.generated_at + Duration::hours(BLOCK_WINDOW_HOURS) =>
            {
                warn!(%email, retries = existing.retry_count, "login OTP blocked");
                return Err(OtpAttemptError::Blocked {
                    until: existing.generated_at + Duration::hours(BLOCK_WINDOW_HOURS),
                });
            }
            Some(existing)
                if now < existing.generated_at + Duration::minutes(RESEND_WINDOW_MINUTES) =>
            {
                LoginOtpAttempt {
                    otp,
                    retry_count: existing.retry_count + 1,
                    is_verified: false,
                    verified_at: None,
                    ..existing
                }
            }
            _ => LoginOtpAttempt {
                email: email.clone(),
                otp,
                expires_at: now + Duration::minutes(LOGIN_OTP_VALID_MINUTES),
                retry_count: 1,
                generated_at: now,
                is_verified: false,
                verified_at: None,
            },
        };

        let message =
            notifications::login_otp_email(&email, &attempt.otp, LOGIN_OTP_VALID_MINUTES);
        let issued = IssuedOtp {
            expires_at: attempt.expires_at,
            retry_count: attempt.retry_count,
        };
        self.attempts.save(attempt)?;
        self.notifier.send(&message)?;
        info!(%email, retries = issued.retry_count, "login OTP issued");
        Ok(issued)
    }

    /// True when `otp` matches the latest code for `email`, has not expired and was not
    /// verified before. A code is consumed by its first successful verification.
    pub fn verify(&self, email: &str, otp: &str) -> Result<bool, OtpAttemptError> {
        let email = normalize(email)?;
        let now = self.clock.now();
        let Some(mut attempt) = self.attempts.find(&email)? else {
            return Ok(false);
        };
        if attempt.is_verified || attempt.otp != otp.trim() || now > attempt.expires_at {
            return Ok(false);
        }
        attempt.is_verified = true;
        attempt.verified_at = Some(now);
        self.attempts.save(attempt)?;
        Ok(true)
    }
}

fn normalize(email: &str) -> Result<String, OtpAttemptError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(OtpAttemptError::MissingEmail);
    }
    Ok(email)
}
