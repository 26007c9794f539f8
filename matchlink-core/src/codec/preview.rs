use std::fmt::Write;

/// Bytes shown before the dump is cut off
pub const PREVIEW_LIMIT: usize = 32;

/// Render a short hex summary of a buffer for log output.
///
/// Format: `[len] 0a 0b 0c` with a trailing `…` once [`PREVIEW_LIMIT`] is
/// exceeded. Diagnostic only.
pub fn preview(bytes: &[u8]) -> String {
    let mut out = format!("[{}]", bytes.len());

    for byte in bytes.iter().take(PREVIEW_LIMIT) {
        let _ = write!(out, " {:02x}", byte);
    }

    if bytes.len() > PREVIEW_LIMIT {
        out.push_str(" …");
    }

    out
}
