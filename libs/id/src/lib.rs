//! # meetup-id
//!
//! Typed identifiers used by the registration engine.
//!
//! Every identifier is rendered as `{prefix}_{ulid}`:
//!
//! - `cal_01HV4Z2WQXKJNM8GPQY6VBKC3D` for a calendar item
//! - `ptc_01HV4Z3MXNKPQR9HSTZ7WCLD4E` for a participant
//! - `req_01HV4Z4NYPLTRS0JTUA8XDME5F` for a request
//!
//! Parsing is strict: the prefix must match the type, so a participant id can
//! never be handed to an API expecting a calendar item id.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

pub use ulid::Ulid;

/// Splits `input` into its prefix and ULID and checks the prefix.
///
/// Used by the generated `parse` functions; exposed so callers with
/// dynamically chosen prefixes can reuse the same rules.
pub fn parse_prefixed(expected: &'static str, input: &str) -> Result<Ulid, IdError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IdError::Empty);
    }

    let (prefix, raw) = input.split_once('_').ok_or(IdError::MissingSeparator)?;
    if prefix != expected {
        return Err(IdError::WrongPrefix {
            expected,
            actual: prefix.to_string(),
        });
    }

    raw.parse::<Ulid>()
        .map_err(|e| IdError::InvalidUlid(e.to_string()))
}
