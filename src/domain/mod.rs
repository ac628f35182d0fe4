pub mod transaction;

pub use transaction::{InboundSmsOutcome, NotificationKind, TransactionStatus, VerificationMethod};
