//! Loose JavaScript literal to strict JSON normalizer
//!
//! Player scripts declare data with unquoted keys, single-quoted strings,
//! hex/octal integers, comments and trailing commas. [`js_to_json`] rewrites
//! such a snippet in one pass so `serde_json` can read it. Only literal
//! syntax is handled; the input is never evaluated.

/// Normalize a loosely written JavaScript literal into JSON text.
///
/// Already strict JSON is returned unchanged.
pub fn js_to_json(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let (literal, next) = read_string(&chars, i);
                out.push_str(&literal);
                i = next;
            }
            '/' if matches!(chars.get(i + 1), Some('/') | Some('*')) => {
                i = skip_comment(&chars, i);
            }
            ',' => {
                let next = chars.get(skip_insignificant(&chars, i + 1));
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(',');
                }
                i += 1;
            }
            '!' => i += 1,
            c if c.is_ascii_digit() => {
                let (number, next) = read_number(&chars, i);
                if chars.get(skip_insignificant(&chars, next)) == Some(&':') {
                    out.push('"');
                    out.push_str(&number);
                    out.push('"');
                } else {
                    out.push_str(&number);
                }
                i = next;
            }
            c if is_ident_start(c) => {
                let mut end = i;
                while end < chars.len() && is_ident_part(chars[end]) {
                    end += 1;
                }
                let ident: String = chars[i..end].iter().collect();
                i = end;

                match ident.as_str() {
                    "true" | "false" | "null" => out.push_str(&ident),
                    "undefined" => out.push_str("null"),
                    "void" => {
                        let operand = skip_insignificant(&chars, end);
                        if chars.get(operand) == Some(&'0') {
                            out.push_str("null");
                            i = operand + 1;
                        } else {
                            out.push_str("\"void\"");
                        }
                    }
                    _ => {
                        out.push('"');
                        out.push_str(&ident);
                        out.push('"');
                    }
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Index of the next character that is neither whitespace nor inside a comment.
fn skip_insignificant(chars: &[char], mut i: usize) -> usize {
    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if chars.get(i) == Some(&'/') && matches!(chars.get(i + 1), Some('/') | Some('*')) {
            i = skip_comment(chars, i);
        } else {
            return i;
        }
    }
}

/// `start` points at a `/` that opens a comment. Line comments stop before the newline.
fn skip_comment(chars: &[char], start: usize) -> usize {
    if chars.get(start + 1) == Some(&'/') {
        let mut i = start + 2;
        while i < chars.len() && chars[i] != '\n' {
            i += 1;
        }
        i
    } else {
        let mut i = start + 2;
        while i + 1 < chars.len() {
            if chars[i] == '*' && chars[i + 1] == '/' {
                return i + 2;
            }
            i += 1;
        }
        chars.len()
    }
}

/// Read a single- or double-quoted literal and re-emit it double quoted.
fn read_string(chars: &[char], start: usize) -> (String, usize) {
    let quote = chars[start];
    let mut content = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some('\'') => content.push('\''),
                Some('\n') => {}
                Some('x') => content.push_str("\\u00"),
                Some(&escaped) => {
                    content.push('\\');
                    content.push(escaped);
                }
                None => content.push('\\'),
            }
            i += 2;
        } else if c == quote {
            return (format!("\"{}\"", content), i + 1);
        } else if c == '"' {
            content.push_str("\\\"");
            i += 1;
        } else {
            content.push(c);
            i += 1;
        }
    }

    (format!("\"{}\"", content), chars.len())
}

/// Read a numeric literal, converting hex and legacy octal integers to decimal.
fn read_number(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() {
        let c = chars[end];
        let exponent_sign =
            (c == '+' || c == '-') && end > start && matches!(chars[end - 1], 'e' | 'E');
        if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
            end += 1;
        } else {
            break;
        }
    }

    let token: String = chars[start..end].iter().collect();
    let converted = if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok().map(|v| v.to_string())
    } else if token.len() > 1 && token.starts_with('0') && token.chars().all(|c| ('0'..='7').contains(&c)) {
        u64::from_str_radix(&token, 8).ok().map(|v| v.to_string())
    } else {
        None
    };

    (converted.unwrap_or(token), end)
}
