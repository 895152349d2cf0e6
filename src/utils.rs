// Utility functions and helpers
// Property-key sandbox and JavaScript-compatible number conversions

/// Property names that could reach outside the data model of the host
/// language; rejected for bare identifiers, dotted members and bracket keys.
pub const DENIED_KEYS: &[&str] = &["constructor", "prototype", "__proto__"];

/// Check whether a key is on the sandbox denylist
#[inline]
pub fn is_denied_key(key: &str) -> bool {
    DENIED_KEYS.contains(&key)
}

/// Format a number the way JavaScript's `String(n)` does for the common cases
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        // covers -0
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}

/// Round half away from zero (`2.5 → 3`, `-2.5 → -3`)
#[inline]
pub fn round_half_away(n: f64) -> f64 {
    n.round()
}

/// `parseFloat` semantics: parse the longest numeric prefix, NaN if there is none
pub fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    // a lone sign or dot is not a number
    if !s[digits_start..end].bytes().any(|b| b.is_ascii_digit()) {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// `parseInt` semantics: optional sign, optional `0x` prefix for radix 16,
/// then the longest run of digits valid in `radix`; NaN if there is none
pub fn parse_int_prefix(s: &str, radix: u32) -> f64 {
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut rest = s.trim_start();
    let mut sign = 1.0;
    if let Some(stripped) = rest.strip_prefix('-') {
        sign = -1.0;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    if radix == 16 {
        if let Some(stripped) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = stripped;
        }
    }

    let mut result = 0.0;
    let mut seen_digit = false;
    for ch in rest.chars() {
        match ch.to_digit(radix) {
            Some(d) => {
                result = result * radix as f64 + d as f64;
                seen_digit = true;
            }
            None => break,
        }
    }

    if seen_digit {
        sign * result
    } else {
        f64::NAN
    }
}

/// `Number(string)` semantics: whole-string conversion, empty string is 0
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                return i64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
            }
            // Rust accepts "inf"/"nan" spellings that JavaScript does not
            if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return f64::NAN;
            }
            trimmed.parse().unwrap_or(f64::NAN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_keys() {
        assert!(is_denied_key("constructor"));
        assert!(is_denied_key("prototype"));
        assert!(is_denied_key("__proto__"));
        assert!(!is_denied_key("proto"));
        assert!(!is_denied_key("Constructor"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(3.14), "3.14");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_round_half_away() {
        assert_eq!(round_half_away(3.5), 4.0);
        assert_eq!(round_half_away(3.4), 3.0);
        assert_eq!(round_half_away(-2.5), -3.0);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("3.14"), 3.14);
        assert_eq!(parse_float_prefix("  42px"), 42.0);
        assert_eq!(parse_float_prefix("1e3"), 1000.0);
        assert_eq!(parse_float_prefix("2e"), 2.0);
        assert_eq!(parse_float_prefix(".5"), 0.5);
        assert!(parse_float_prefix("abc").is_nan());
        assert!(parse_float_prefix("-").is_nan());
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("42", 10), 42.0);
        assert_eq!(parse_int_prefix("3.14", 10), 3.0);
        assert_eq!(parse_int_prefix("10", 2), 2.0);
        assert_eq!(parse_int_prefix("FF", 16), 255.0);
        assert_eq!(parse_int_prefix("0xff", 16), 255.0);
        assert_eq!(parse_int_prefix("-12abc", 10), -12.0);
        assert!(parse_int_prefix("xyz", 10).is_nan());
        assert!(parse_int_prefix("1", 1).is_nan());
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("42"), 42.0);
        assert_eq!(string_to_number(" 3.14 "), 3.14);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
    }
}
