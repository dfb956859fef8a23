//! Content-Disposition filename extraction.
//!
//! The image endpoint may answer with the real stored filename, e.g.
//! `attachment; filename="rifa 01.png"; filename*=UTF-8''rifa%2001.png`.
//! The extended `filename*` form wins over the plain one when both are
//! present and decodable.

use std::borrow::Cow;

/// Extract the filename parameter from a Content-Disposition header value.
///
/// Returns the last path segment of the filename with surrounding
/// whitespace removed, or `None` if the header carries no usable filename.
pub fn parse_disposition_filename(header: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    let mut extended: Option<String> = None;

    for param in split_params(header) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                if extended.is_none() {
                    extended = decode_extended(value.trim());
                }
            }
            "filename" => {
                if plain.is_none() {
                    plain = Some(unquote(value.trim()));
                }
            }
            _ => {}
        }
    }

    let name = extended.or(plain)?;
    let segment = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Split on `;` outside of quoted strings.
fn split_params(header: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (idx, c) in header.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&header[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    params.push(&header[start..]);
    params
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode an RFC 5987 `charset'language'percent-encoded` value.
fn decode_extended(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?.trim().to_ascii_lowercase();
    let _language = parts.next()?;
    let encoded = parts.next()?;

    match charset.as_str() {
        "utf-8" => urlencoding::decode(encoded).ok().map(Cow::into_owned),
        "iso-8859-1" => Some(
            urlencoding::decode_binary(encoded.as_bytes())
                .iter()
                .map(|&b| b as char)
                .collect(),
        ),
        _ => None,
    }
}
