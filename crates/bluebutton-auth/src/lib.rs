//! Blue Button OAuth2 authentication library
//!
//! Authorization Code with PKCE flow for a single end-user session:
//! state/verifier generation, authorization URL construction, code exchange
//! and refresh. Nothing here holds state between calls; the caller owns the
//! `AuthRequestContext` and every `Token` and threads them through.
//!
//! Login flow:
//! 1. Caller generates an `AuthRequestContext` with `generate_auth_context()`
//! 2. User is redirected to `build_authorize_url()`
//! 3. Callback code and state go to `exchange_code()`, which consumes the context
//! 4. Later, `refresh()` trades the refresh token for a new `Token`

pub mod constants;
pub mod error;
pub mod exchange;
pub mod pkce;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use exchange::{exchange_code, refresh};
pub use pkce::{
    AuthRequestContext, build_authorize_url, compute_challenge, generate_auth_context,
    generate_random_state,
};
pub use token::Token;
