use chrono::{DateTime, Utc};
use rand::Rng;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Produces numeric codes for login OTPs, challan numbers and payment order ids.
pub trait CodeGenerator: Send + Sync {
    fn digits(&self, len: usize) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn digits(&self, len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}
