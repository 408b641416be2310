//! Wire models exchanged with the interview API gateway.
//!
//! Field names follow the gateway's JSON (camelCase); enum values follow its
//! upper-case Java enums.

pub mod analysis;
pub mod question;
pub mod session;

pub use analysis::Analysis;
pub use question::{Difficulty, ParseDifficultyError, Question};
pub use session::{Session, SessionStatus};
