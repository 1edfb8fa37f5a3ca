//! Log line → stratum message decoding
//!
//! Miner debug streams wrap the JSON payload in timestamps, thread tags and
//! direction arrows. The payload is taken from the first plausible '{' (one
//! that opens a JSON object: next non-space char is '"' or '}') up to the
//! last '}' on the line.

use tracing::trace;

use super::types::{MiningNotifyParams, StratumMessage, MINING_NOTIFY};

/// True when the emitting component matches one of the stratum tags
/// (case-insensitive substring match, e.g. "Stratum", "stratum-client").
pub fn is_stratum_component(component: &str, tags: &[String]) -> bool {
    let component = component.to_ascii_lowercase();
    tags.iter().any(|tag| component.contains(&tag.to_ascii_lowercase()))
}

/// Locate the JSON object embedded in a log line.
pub fn extract_json_payload(line: &str) -> Option<&str> {
    let start = line.char_indices().find_map(|(i, c)| {
        if c != '{' {
            return None;
        }
        let next = line[i + 1..].trim_start().chars().next();
        matches!(next, Some('"') | Some('}')).then_some(i)
    })?;
    let end = line.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&line[start..=end])
}

/// Decode one JSON object into a stratum envelope.
pub fn decode_message(json: &str) -> Option<StratumMessage> {
    match serde_json::from_str::<StratumMessage>(json) {
        Ok(message) => Some(message),
        Err(e) => {
            trace!("Undecodable stratum payload: {}", e);
            None
        }
    }
}

/// Full line pipeline: contains "mining.notify" → payload → envelope → params.
pub fn decode_notify_line(text: &str) -> Option<MiningNotifyParams> {
    if !text.contains(MINING_NOTIFY) {
        return None;
    }
    let payload = extract_json_payload(text)?;
    let message = decode_message(payload)?;
    MiningNotifyParams::from_message(&message)
}
