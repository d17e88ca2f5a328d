//! Signed capability tokens.
//!
//! A token is `<payload>.<signature>`, both segments URL-safe base64 without
//! padding. The payload is the JSON encoding of [`TokenClaims`]; the signature
//! is HMAC-SHA256 over a version byte followed by the payload bytes, keyed by
//! the process-wide [`SigningSecret`].

#![warn(missing_docs, clippy::pedantic)]

mod claims;
mod clock;
mod codec;
mod secret;

pub use claims::TokenClaims;
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{MAX_TOKEN_LEN, TokenCodec, global, install_global};
pub use secret::{MIN_SECRET_LEN, SigningSecret};
