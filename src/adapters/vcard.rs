use crate::domain::model::{DecodedRecord, RawRecord};
use crate::domain::ports::RecordDecoder;
use crate::utils::error::{DiscoveryError, Result};

/// Extracts the handful of vCard properties a `Contact` carries.
///
/// Handles line folding, property groups, parameters and value escapes. Everything else in
/// the card is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct VCardDecoder;

fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match line.strip_prefix([' ', '\t']) {
            Some(continuation) if !lines.is_empty() => {
                if let Some(last) = lines.last_mut() {
                    last.push_str(continuation);
                }
            }
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Splits on `;` that are not escaped.
fn components(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push('\\');
                current.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            ';' => parts.push(unescape(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    parts.push(unescape(&current));
    parts
}

impl RecordDecoder for VCardDecoder {
    fn decode(&self, record: &RawRecord) -> Result<DecodedRecord> {
        let lines = unfold(record.0.trim());
        let mut content = lines.iter().filter(|l| !l.trim().is_empty());

        match content.next() {
            Some(first) if first.trim().eq_ignore_ascii_case("BEGIN:VCARD") => {}
            _ => return Err(DiscoveryError::decode("payload does not start with BEGIN:VCARD")),
        }

        let mut decoded = DecodedRecord::default();
        let mut given_name = String::new();
        let mut closed = false;

        for line in content {
            if line.trim().eq_ignore_ascii_case("END:VCARD") {
                closed = true;
                break;
            }
            let Some((head, value)) = line.split_once(':') else {
                return Err(DiscoveryError::decode(format!("property line without value: {}", line)));
            };
            let name = head.split(';').next().unwrap_or_default();
            let name = name.rsplit('.').next().unwrap_or(name).to_ascii_uppercase();

            match name.as_str() {
                "FN" => decoded.formatted_name = unescape(value).trim().to_string(),
                "TITLE" => decoded.title = unescape(value).trim().to_string(),
                "N" => {
                    let parts = components(value);
                    decoded.last_name = parts.first().cloned().unwrap_or_default();
                    given_name = parts.get(1).cloned().unwrap_or_default();
                }
                "TEL" => {
                    let number = value.strip_prefix("tel:").unwrap_or(value).trim();
                    if !number.is_empty() {
                        decoded.phones.push(number.to_string());
                    }
                }
                "EMAIL" => {
                    let address = unescape(value).trim().to_string();
                    if !address.is_empty() {
                        decoded.emails.push(address);
                    }
                }
                _ => {}
            }
        }

        if !closed {
            return Err(DiscoveryError::decode("payload is missing END:VCARD"));
        }
        if decoded.formatted_name.is_empty() {
            decoded.formatted_name = [given_name.as_str(), decoded.last_name.as_str()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
        }
        Ok(decoded)
    }
}
