//! Player identifier conversion between the event source and the rank store.
//!
//! The event source speaks 64-bit numeric ids; the rank table is keyed by the
//! textual `STEAM_1:<y>:<z>` form. Lookups always go through [`to_steam_id`].

use crate::error::{CoreError, Result};

/// Offset of the individual-account id space inside the 64-bit id.
pub const ID64_BASE: u64 = 76_561_197_960_265_728;

/// Convert a numeric 64-bit id into the canonical store id.
///
/// Subtraction wraps, so every parseable `u64` yields a deterministic result.
pub fn to_steam_id(id64: &str) -> Result<String> {
    let id: u64 = id64
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidIdentifier(id64.to_string()))?;
    Ok(from_id64(id))
}

pub fn from_id64(id: u64) -> String {
    let account = id.wrapping_sub(ID64_BASE) / 2;
    let universe_bit = id % 2;
    format!("STEAM_1:{universe_bit}:{account}")
}
