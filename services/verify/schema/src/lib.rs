//! sea-orm entities for the verify service's tables.

pub mod otp_challenges;
pub mod outbox_events;
pub mod users;
pub mod verification_sessions;
pub mod verification_tokens;
