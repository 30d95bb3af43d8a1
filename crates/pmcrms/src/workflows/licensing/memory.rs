//! In-process adapters backing the demo server and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::domain::{
    ApplicationId, ApplicationRecord, Appointment, BlobKey, Challan, LoginOtpAttempt, Officer,
    OfficerAssignment, OfficerProfile, OtpVerification, PaymentTransaction, UserAccount, UserId,
};
use super::repository::{
    ApplicationCommit, ApplicationQuery, ApplicationRepository, DirectoryRepository,
    DocumentStore, DocumentStoreError, EmailMessage, NotificationError, Notifier,
    OtpAttemptRepository, RepositoryError,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{what} lock poisoned")))
}

#[derive(Default)]
struct ApplicationTables {
    applications: HashMap<ApplicationId, ApplicationRecord>,
    sequences: HashMap<i32, u32>,
    appointments: HashMap<ApplicationId, Appointment>,
    assignments: Vec<OfficerAssignment>,
    signature_otps: Vec<OtpVerification>,
    transactions: HashMap<ApplicationId, PaymentTransaction>,
    challans: HashMap<ApplicationId, Challan>,
}

/// Application store guarded by a single mutex, so every commit is atomic.
#[derive(Clone, Default)]
pub struct InMemoryApplicationRepository {
    tables: Arc<Mutex<ApplicationTables>>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn allocate_sequence(&self, year: i32) -> Result<u32, RepositoryError> {
        let mut tables = lock(&self.tables, "application")?;
        let latest = tables
            .applications
            .values()
            .filter(|record| record.number.year == year)
            .map(|record| record.number.sequence)
            .max()
            .unwrap_or(0);
        let counter = tables.sequences.entry(year).or_insert(latest);
        *counter = (*counter).max(latest) + 1;
        Ok(*counter)
    }

    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut tables = lock(&self.tables, "application")?;
        if tables.applications.contains_key(&record.id) {
            return Err(RepositoryError::Conflict(format!(
                "application {} exists",
                record.id
            )));
        }
        if tables
            .applications
            .values()
            .any(|existing| existing.number == record.number)
        {
            return Err(RepositoryError::Conflict(format!(
                "application number {} is taken",
                record.number
            )));
        }
        tables.applications.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        Ok(tables.applications.get(id).cloned())
    }

    fn query(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        let mut matches: Vec<_> = tables
            .applications
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.number.cmp(&a.number))
        });
        Ok(matches
            .into_iter()
            .skip(query.skip)
            .take(query.take)
            .collect())
    }

    fn commit(&self, commit: ApplicationCommit) -> Result<ApplicationRecord, RepositoryError> {
        let mut tables = lock(&self.tables, "application")?;
        let id = commit.application.id;
        let current = tables
            .applications
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("application {id}")))?;
        if current.version != commit.expected_version {
            return Err(RepositoryError::Conflict(format!(
                "application {id} is at version {}, expected {}",
                current.version, commit.expected_version
            )));
        }
        if commit.appointment.is_some() && tables.appointments.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!(
                "application {id} already has an appointment"
            )));
        }
        if commit.challan.is_some()
            && tables
                .challans
                .get(&id)
                .is_some_and(|challan| challan.is_generated)
        {
            return Err(RepositoryError::Conflict(format!(
                "application {id} already has a challan"
            )));
        }
        let otp_index = match commit.consumed_otp {
            Some((otp_id, _)) => Some(
                tables
                    .signature_otps
                    .iter()
                    .position(|otp| otp.id == otp_id && !otp.is_used)
                    .ok_or_else(|| {
                        RepositoryError::Conflict(format!("signature OTP {otp_id} already used"))
                    })?,
            ),
            None => None,
        };

        let mut record = commit.application;
        record.version = commit.expected_version + 1;
        tables.applications.insert(id, record.clone());
        if let Some(appointment) = commit.appointment {
            tables.appointments.insert(id, appointment);
        }
        if let Some(assignment) = commit.assignment {
            tables.assignments.push(assignment);
        }
        if let (Some(index), Some((_, used_at))) = (otp_index, commit.consumed_otp) {
            let otp = &mut tables.signature_otps[index];
            otp.is_used = true;
            otp.used_at = Some(used_at);
        }
        if let Some(transaction) = commit.transaction {
            tables.transactions.insert(id, transaction);
        }
        if let Some(challan) = commit.challan {
            tables.challans.insert(id, challan);
        }
        Ok(record)
    }

    fn appointment(&self, id: &ApplicationId) -> Result<Option<Appointment>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        Ok(tables.appointments.get(id).cloned())
    }

    fn assignments(&self, id: &ApplicationId) -> Result<Vec<OfficerAssignment>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        Ok(tables
            .assignments
            .iter()
            .filter(|assignment| &assignment.application_id == id)
            .cloned()
            .collect())
    }

    fn record_signature_otp(&self, otp: OtpVerification) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables, "application")?;
        tables.signature_otps.push(otp);
        Ok(())
    }

    fn signature_otps(&self, id: &ApplicationId) -> Result<Vec<OtpVerification>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        Ok(tables
            .signature_otps
            .iter()
            .filter(|otp| &otp.application_id == id)
            .cloned()
            .collect())
    }

    fn transaction(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PaymentTransaction>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        Ok(tables.transactions.get(id).cloned())
    }

    fn challan(&self, id: &ApplicationId) -> Result<Option<Challan>, RepositoryError> {
        let tables = lock(&self.tables, "application")?;
        Ok(tables.challans.get(id).cloned())
    }
}

#[derive(Default)]
struct DirectoryTables {
    users: HashMap<UserId, UserAccount>,
    officers: HashMap<UserId, Officer>,
}

/// Users and officers; accounts are registered directly since they come from identity.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    tables: Arc<Mutex<DirectoryTables>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(&self, account: UserAccount) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables, "directory")?;
        tables.users.insert(account.id.clone(), account);
        Ok(())
    }
}

impl DirectoryRepository for InMemoryDirectory {
    fn user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let tables = lock(&self.tables, "directory")?;
        Ok(tables.users.get(id).cloned())
    }

    fn insert_user(&self, account: UserAccount) -> Result<UserAccount, RepositoryError> {
        let mut tables = lock(&self.tables, "directory")?;
        if tables.users.contains_key(&account.id) {
            return Err(RepositoryError::Conflict(format!(
                "user {} already exists",
                account.id
            )));
        }
        tables.users.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    fn officer_for_user(&self, id: &UserId) -> Result<Option<Officer>, RepositoryError> {
        let tables = lock(&self.tables, "directory")?;
        Ok(tables.officers.get(id).cloned())
    }

    fn insert_officer(&self, officer: Officer) -> Result<Officer, RepositoryError> {
        let mut tables = lock(&self.tables, "directory")?;
        if tables.officers.contains_key(&officer.user_id) {
            return Err(RepositoryError::Conflict(format!(
                "user {} already has an officer profile",
                officer.user_id
            )));
        }
        tables
            .officers
            .insert(officer.user_id.clone(), officer.clone());
        Ok(officer)
    }

    fn officers(&self) -> Result<Vec<OfficerProfile>, RepositoryError> {
        let tables = lock(&self.tables, "directory")?;
        let mut profiles: Vec<_> = tables
            .officers
            .values()
            .filter_map(|officer| {
                tables.users.get(&officer.user_id).map(|account| OfficerProfile {
                    officer: officer.clone(),
                    account: account.clone(),
                })
            })
            .collect();
        profiles.sort_by(|a, b| a.officer.created_at.cmp(&b.officer.created_at));
        Ok(profiles)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOtpAttempts {
    attempts: Arc<Mutex<HashMap<String, LoginOtpAttempt>>>,
}

impl OtpAttemptRepository for InMemoryOtpAttempts {
    fn find(&self, email: &str) -> Result<Option<LoginOtpAttempt>, RepositoryError> {
        let attempts = lock(&self.attempts, "otp attempt")?;
        Ok(attempts.get(email).cloned())
    }

    fn save(&self, attempt: LoginOtpAttempt) -> Result<(), RepositoryError> {
        let mut attempts = lock(&self.attempts, "otp attempt")?;
        attempts.insert(attempt.email.clone(), attempt);
        Ok(())
    }
}

/// Blobs kept in memory under GUID-prefixed keys.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    blobs: Arc<Mutex<HashMap<BlobKey, Vec<u8>>>>,
}

impl InMemoryDocumentStore {
    /// Keys of every stored blob whose name ends with `suffix`.
    pub fn keys_ending_with(&self, suffix: &str) -> Vec<BlobKey> {
        self.blobs
            .lock()
            .map(|blobs| {
                blobs
                    .keys()
                    .filter(|key| key.0.ends_with(suffix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<BlobKey, DocumentStoreError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| DocumentStoreError::Io("document lock poisoned".to_string()))?;
        let key = BlobKey(format!("{}_{name}", Uuid::new_v4()));
        blobs.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    fn read(&self, key: &BlobKey) -> Result<Vec<u8>, DocumentStoreError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| DocumentStoreError::Io("document lock poisoned".to_string()))?;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| DocumentStoreError::NotFound(key.clone()))
    }

    fn delete(&self, key: &BlobKey) -> Result<(), DocumentStoreError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| DocumentStoreError::Io("document lock poisoned".to_string()))?;
        blobs.remove(key);
        Ok(())
    }
}

/// Notifier that keeps every message for later inspection.
#[derive(Clone, Default)]
pub struct OutboxNotifier {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl OutboxNotifier {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Delivery("outbox lock poisoned".to_string()))?;
        sent.push(message.clone());
        Ok(())
    }
}
