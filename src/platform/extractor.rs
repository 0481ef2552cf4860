//! Extraction of decoder routines from the player script
//!
//! The player script is several megabytes of obfuscated JavaScript. Instead of
//! running it, the two routines needed for stream URLs are sliced out as small
//! self-contained fragments:
//!
//! - the signature cipher function and the helper object it calls into
//! - the n-parameter (throttling) function, resolved through its lookup array

use crate::error::MediaError;
use crate::platform::cipher::DecoderFunction;
use crate::platform::jsjson::js_to_json;
use regex::Regex;
use tracing::debug;

/// Extract the signature cipher decoder and its helper object
pub fn extract_cipher_decoder(player_js: &str) -> Result<DecoderFunction, MediaError> {
    let entry_re = Regex::new(
        r#"(?:^|[^a-zA-Z0-9$_.])([a-zA-Z0-9$]{1,4})=function\(a\)\{a=a\.split\(""\);[a-zA-Z0-9_$]+\."#,
    )?;
    let captures = entry_re.captures(player_js).ok_or_else(|| {
        MediaError::PatternNotFound("signature cipher function".to_string())
    })?;
    let name_match = captures
        .get(1)
        .ok_or_else(|| MediaError::PatternNotFound("signature cipher function name".to_string()))?;
    let entry_name = name_match.as_str();

    let open = name_match.end() + player_js[name_match.end()..].find('{').unwrap_or(0);
    let close = find_balanced_end(player_js, open, '{', '}').ok_or_else(|| {
        MediaError::PatternNotFound("end of signature cipher function".to_string())
    })?;
    let function = &player_js[name_match.start()..=close];

    let body_start = function.find("a=a.split(\"\");").map(|i| i + 14).unwrap_or(0);
    let helper_re = Regex::new(r"([a-zA-Z_$][a-zA-Z0-9_$]*)\.([a-zA-Z_$][a-zA-Z0-9_$]*)\(")?;
    let helper_name = helper_re
        .captures(&function[body_start..])
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| MediaError::PatternNotFound("signature cipher helper call".to_string()))?;

    let helper = extract_object_literal(player_js, helper_name)?;
    debug!(
        "Extracted cipher decoder {} with helper {} ({} bytes)",
        entry_name,
        helper_name,
        function.len() + helper.len()
    );

    Ok(DecoderFunction::new(
        format!("var {};\n{}", function, helper),
        entry_name,
    ))
}

/// Extract the n-parameter decoder
pub fn extract_n_decoder(player_js: &str) -> Result<DecoderFunction, MediaError> {
    let call_re = Regex::new(
        r#"\.get\("n"\)\)&&\([a-zA-Z0-9$_]+=(?P<nfunc>[a-zA-Z0-9$_]+)(?:\[(?P<idx>\d+)\])?\([a-zA-Z0-9$_]+\)"#,
    )?;
    let captures = call_re
        .captures(player_js)
        .ok_or_else(|| MediaError::PatternNotFound("n parameter call site".to_string()))?;
    let name = captures
        .name("nfunc")
        .map(|m| m.as_str())
        .ok_or_else(|| MediaError::PatternNotFound("n parameter function name".to_string()))?;

    let function_name = match captures.name("idx") {
        Some(idx) => {
            let index: usize = idx
                .as_str()
                .parse()
                .map_err(|_| MediaError::PatternNotFound(format!("n function index {}", idx.as_str())))?;
            resolve_array_entry(player_js, name, index)?
        }
        None => name.to_string(),
    };

    let function_re = Regex::new(&format!(
        r#"(?s)(?:^|[^a-zA-Z0-9$_.])({}=function\(.*?return [a-zA-Z0-9$_]+\.join\(""\))"#,
        regex::escape(&function_name)
    ))?;
    let function = function_re
        .captures(player_js)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| MediaError::PatternNotFound(format!("n function {}", function_name)))?;

    debug!("Extracted n decoder {} ({} bytes)", function_name, function.len());

    Ok(DecoderFunction::new(
        format!("var {}}};", function),
        function_name,
    ))
}

/// Resolve `var <name>=[...]` and return the function name at `index`
fn resolve_array_entry(player_js: &str, name: &str, index: usize) -> Result<String, MediaError> {
    let array_re = Regex::new(&format!(r"var\s+{}\s*=\s*\[", regex::escape(name)))?;
    let found = array_re
        .find(player_js)
        .ok_or_else(|| MediaError::PatternNotFound(format!("n function array {}", name)))?;

    let open = found.end() - 1;
    let close = find_balanced_end(player_js, open, '[', ']')
        .ok_or_else(|| MediaError::PatternNotFound(format!("end of array {}", name)))?;

    let entries: Vec<serde_json::Value> = serde_json::from_str(&js_to_json(&player_js[open..=close]))
        .map_err(|e| MediaError::PatternNotFound(format!("array {} is not a literal: {}", name, e)))?;

    entries
        .get(index)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| MediaError::PatternNotFound(format!("{}[{}]", name, index)))
}

/// Slice out `var <name>={...};` as a standalone declaration
fn extract_object_literal(player_js: &str, name: &str) -> Result<String, MediaError> {
    let object_re = Regex::new(&format!(r"var\s+{}\s*=\s*\{{", regex::escape(name)))?;
    let found = object_re
        .find(player_js)
        .ok_or_else(|| MediaError::PatternNotFound(format!("helper object {}", name)))?;

    let open = found.end() - 1;
    let close = find_balanced_end(player_js, open, '{', '}')
        .ok_or_else(|| MediaError::PatternNotFound(format!("end of helper object {}", name)))?;

    Ok(format!("var {}={};", name, &player_js[open..=close]))
}

/// Find the byte index of the bracket closing the one at `open`.
///
/// Counts nesting with a stack depth and skips over string literals so
/// brackets inside quotes do not unbalance the scan.
pub fn find_balanced_end(text: &str, open: usize, open_ch: char, close_ch: char) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open).copied() != Some(open_ch as u8) {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' || b == b'`' {
                    quote = Some(b);
                } else if b == open_ch as u8 {
                    depth += 1;
                } else if b == close_ch as u8 {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
            }
        }
        i += 1;
    }

    None
}
