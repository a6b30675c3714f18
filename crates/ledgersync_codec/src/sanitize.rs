//! Pre-parse cleanup of raw response text.
//!
//! The source emits documents that no strict parser accepts as-is:
//! character references to control codes, raw control bytes, unescaped
//! ampersands in names (`M&M Traders`) and vendor namespace prefixes on
//! undeclared namespaces (`<UDF:FIELD>`). [`sanitize`] repairs those and
//! nothing else.
//!
//! A reference that cannot be decoded at all fails the whole document.

use crate::error::{CodecError, CodecResult};

/// Cleans a raw response so it can be parsed.
///
/// - `&#N;` / `&#xH;` references to code points below 32 (other than tab,
///   LF and CR) are removed.
/// - Raw control characters (`U+0000`–`U+001F` except tab/LF/CR, and
///   `U+007F`–`U+009F`) are removed.
/// - An `&` that does not start a predefined entity (`&amp;`, `&lt;`,
///   `&gt;`, `&quot;`, `&apos;`) or a character reference becomes `&amp;`.
/// - Tag-name prefixes are flattened: `<UDF:NAME>` becomes `<UDF_NAME>`.
pub fn sanitize(input: &str) -> CodecResult<String> {
    if input.trim().is_empty() {
        return Err(CodecError::sanitize(0, "empty document"));
    }

    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while let Some(c) = input[i..].chars().next() {
        match c {
            '&' if input[i..].starts_with("&#") => {
                let (len, code) = parse_char_ref(&input[i..])
                    .ok_or_else(|| CodecError::sanitize(i, "invalid character reference"))?;
                if !is_forbidden_reference(code) {
                    out.push_str(&input[i..i + len]);
                }
                i += len;
            }
            '&' => {
                if starts_with_entity(&input[i..]) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
                i += 1;
            }
            '<' => {
                i += rewrite_tag_prefix(&input[i..], &mut out);
            }
            c if is_stripped_raw(c) => {
                i += c.len_utf8();
            }
            c => {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }

    Ok(out)
}

fn starts_with_entity(s: &str) -> bool {
    ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"]
        .iter()
        .any(|e| s.starts_with(e))
}

fn is_forbidden_reference(code: u32) -> bool {
    code < 32 && !matches!(code, 9 | 10 | 13)
}

fn is_stripped_raw(c: char) -> bool {
    matches!(c as u32, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F..=0x9F)
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parses `&#...;` at the start of `s`, returning its byte length and code point.
fn parse_char_ref(s: &str) -> Option<(usize, u32)> {
    let body = s.strip_prefix("&#")?;
    let (digits, radix, prefix_len) = match body.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16, 3),
        None => (body, 10, 2),
    };
    let end = digits.find(';')?;
    let number = &digits[..end];
    if number.is_empty() || !number.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let code = u32::from_str_radix(number, radix).ok()?;
    char::from_u32(code)?;
    Some((prefix_len + end + 1, code))
}

/// Copies the tag opener at the start of `s` into `out`, flattening a
/// `prefix:local` name. Returns the number of bytes consumed.
fn rewrite_tag_prefix(s: &str, out: &mut String) -> usize {
    let mut pos = 1;
    let closing = s[pos..].starts_with('/');
    if closing {
        pos += 1;
    }

    let prefix_end = pos + word_len(&s[pos..]);
    if prefix_end > pos && s[prefix_end..].starts_with(':') {
        let local_start = prefix_end + 1;
        let local_end = local_start + word_len(&s[local_start..]);
        if local_end > local_start {
            out.push('<');
            if closing {
                out.push('/');
            }
            out.push_str(&s[pos..prefix_end]);
            out.push('_');
            out.push_str(&s[local_start..local_end]);
            return local_end;
        }
    }

    out.push('<');
    1
}

fn word_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !is_word(*c))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
