//! Reply extraction — classify thread messages and strip quoted history.
//!
//! Works on the raw provider payload tree: decide whether a message was
//! authored by the tracked prospect, pull readable text out of the MIME
//! structure, and cut off the quoted original below the reply.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;

use crate::gmail::payload::{Message, MessagePart};

/// Gmail serves unpadded base64url; some gateways pad it anyway, so the
/// decoder accepts both.
const URL_SAFE_FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Quote-boundary patterns, tried in this exact order.
///
/// The first pattern that matches anywhere in the text wins, even when a
/// later pattern in the list would have matched at an earlier position.
/// Campaign digests depend on this ordering, so it stays
/// ordering-dependent on purpose.
static QUOTE_BOUNDARIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)\n\s*On\s+.*wrote:",   // "On ... wrote:"
        r"(?is)\n\s*Op\s+.*schreef:", // Dutch "Op ... schreef:"
        r"(?is)\n\s*From:",           // forwarded header block
        r"(?is)\n\s*Van:",            // Dutch "From:"
        r"(?is)\n\s*>",               // conventional quote marker
        r"(?is)\n\s*-----Original Message-----",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static HTML_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// True when the message's From header mentions the prospect's address.
///
/// Case-insensitive substring match, not address equality: tolerant of
/// display-name forms like `"Jane Doe" <jane@co.com>`, but a prospect
/// address that is a substring of a longer unrelated address will
/// false-positive. Known limitation.
pub fn is_reply_from_prospect(message: &Message, prospect_email: &str) -> bool {
    let Some(payload) = &message.payload else {
        return false;
    };
    let from_header = payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("from"))
        .map(|h| h.value.to_lowercase())
        .unwrap_or_default();
    from_header.contains(&prospect_email.to_lowercase())
}

/// Walk a MIME payload tree and pull out readable text.
///
/// Plain-text leaves are base64url-decoded with lossy UTF-8. HTML leaves
/// are decoded the same way and then flattened by deleting `<...>` tag
/// markup with one regex pass, not a real HTML parse. Multipart
/// containers yield the first part producing non-empty text, in order.
/// Every other MIME type yields nothing. The result is trimmed.
pub fn extract_text_from_payload(payload: &MessagePart) -> String {
    let text = if payload.mime_type == "text/plain" {
        decode_part_data(payload)
    } else if payload.mime_type == "text/html" {
        let html = decode_part_data(payload);
        HTML_TAGS.replace_all(&html, "").into_owned()
    } else if payload.mime_type.starts_with("multipart/") {
        payload
            .parts
            .iter()
            .map(extract_text_from_payload)
            .find(|part_text| !part_text.is_empty())
            .unwrap_or_default()
    } else {
        String::new()
    };
    text.trim().to_string()
}

/// Extract the human-authored reply text from a full message, with the
/// quoted original stripped.
///
/// The boundary scan tries [`QUOTE_BOUNDARIES`] in list order and stops
/// at the first pattern that matches anywhere; it does not look for the
/// positionally earliest boundary across all patterns. Everything
/// strictly before the match start is kept, trimmed.
pub fn parse_reply_content(message: &Message) -> String {
    let Some(payload) = &message.payload else {
        return String::new();
    };
    let full_text = extract_text_from_payload(payload);
    if full_text.is_empty() {
        return full_text;
    }

    for pattern in QUOTE_BOUNDARIES.iter() {
        if let Some(m) = pattern.find(&full_text) {
            return full_text[..m.start()].trim().to_string();
        }
    }

    full_text
}

/// Decode a leaf part's inline base64url data. Undecodable data yields
/// empty text rather than an error.
fn decode_part_data(part: &MessagePart) -> String {
    let Some(data) = part.body.data.as_deref() else {
        return String::new();
    };
    if data.is_empty() {
        return String::new();
    }
    match URL_SAFE_FORGIVING.decode(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
