//! OAuth sign-in, sign-out, and the authentication gate.
//!
//! Flow overview:
//! - `GET /auth/login` mints a signed `state` and redirects to the provider.
//! - `GET /auth/callback` checks `state`, exchanges the code, reads userinfo,
//!   and sets the encrypted `session_id` cookie.
//! - `GET|POST /auth/logout` expires the cookie.
//!
//! Protected routes sit behind [`require_auth`].

pub mod cookies;
pub mod gate;
pub mod oauth;
pub mod state;

pub use gate::{authenticate, require_auth, AuthContext, AuthMethod};
pub use state::{AuthConfig, AuthState};
