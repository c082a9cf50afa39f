//! Boolean flags stored remotely as a singleton string set.
//!
//! Some NSX profiles express an on/off setting as membership of a fixed
//! token in a list field. `true` is exactly `[token]`, `false` is `[]`.
//! Anything else on the remote side was changed out of band and reads as
//! `false`.

/// Whitelist provider enabling SpoofGuard address bindings on a port.
pub const LPORT_BINDINGS: &str = "LPORT_BINDINGS";

/// Encode a flag as the remote list value.
pub fn encode_sentinel_flag(enabled: bool, token: &str) -> Vec<String> {
    if enabled {
        vec![token.to_string()]
    } else {
        Vec::new()
    }
}

/// Decode a remote list value. Only the exact singleton `[token]` is `true`.
pub fn decode_sentinel_flag(values: &[String], token: &str) -> bool {
    matches!(values, [only] if only == token)
}
