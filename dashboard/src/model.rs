//! Data exchanged with the backend API
//!
//! Everything here is server-owned and only read by the client. Payloads are snake_case JSON as
//! served by the backend.

pub mod analytics;
pub mod users;

pub use analytics::{AnalyticsSnapshot, Coordinates, HourlyBucket, LoginAttempt};
pub use users::{Authenticated, NewAccount, PasswordChange, UserProfile, UserRecord};
