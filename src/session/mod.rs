//! First-party session tokens and OAuth `state` values.

pub mod codec;
pub mod state;

pub use codec::{SessionClaims, SessionCodec, SessionData, SessionError};
pub use state::{CsrfStateCodec, StateError};
