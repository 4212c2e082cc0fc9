//! Authentication module: session lifecycle, durable storage, token
//! inspection, and route guarding.

pub mod guard;
pub mod session;
pub mod storage;
pub mod token;

pub use guard::GuardDecision;
pub use session::{SessionSnapshot, SessionState, SessionStore};
pub use storage::{CredentialPair, SessionStorage};
