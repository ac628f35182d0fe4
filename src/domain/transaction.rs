//! Transaction lifecycle vocabulary.
//! Statuses are stored as text in the database; these enums own the
//! spelling and the transition rules.

use std::fmt;

/// Lifecycle status of a mobile money transaction.
///
/// `initiated → pending → {confirmed | failed | expired | cancelled}`.
/// Terminal statuses are sticky; nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Initiated,
    Pending,
    Confirmed,
    Failed,
    Expired,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Initiated => "initiated",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initiated" => Some(TransactionStatus::Initiated),
            "pending" => Some(TransactionStatus::Pending),
            "confirmed" => Some(TransactionStatus::Confirmed),
            "failed" => Some(TransactionStatus::Failed),
            "expired" => Some(TransactionStatus::Expired),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses that can still move somewhere else.
    pub fn is_active(self) -> bool {
        matches!(self, TransactionStatus::Initiated | TransactionStatus::Pending)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Only not-yet-settled attempts may be cancelled by the payer.
    pub fn is_cancellable(self) -> bool {
        self.is_active()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a confirmation (or failure) was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    Sms,
    Manual,
    Webhook,
    Admin,
}

impl VerificationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationMethod::Sms => "sms",
            VerificationMethod::Manual => "manual",
            VerificationMethod::Webhook => "webhook",
            VerificationMethod::Admin => "admin",
        }
    }
}

/// Category of an outbound SMS, recorded with every notification row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PaymentInstructions,
    PaymentReminder,
    PaymentConfirmed,
    PaymentFailed,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::PaymentInstructions => "payment_instructions",
            NotificationKind::PaymentReminder => "payment_reminder",
            NotificationKind::PaymentConfirmed => "payment_confirmed",
            NotificationKind::PaymentFailed => "payment_failed",
        }
    }
}

/// Result of feeding an inbound provider SMS through the matcher.
///
/// A failure-classified message marks the transaction `failed` instead of
/// leaving it pending until the expiry sweep; ambiguous traffic is
/// indistinguishable from noise and reported as `NoMatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundSmsOutcome {
    NoMatch,
    MatchedFailure,
    MatchedSuccess,
}
