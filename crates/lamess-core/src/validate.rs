//! String predicates shared by the packet builder and configuration loader.

use std::sync::LazyLock;

use regex::Regex;

// https://www.w3.org/TR/html5/forms.html#valid-e-mail-address
const EMAIL_PATTERN: &str = "^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";
const IPV4_PATTERN: &str = r"^(([0-9]|[0-9][0-9]|[1][0-9]{2}|[2][1-4][0-9]|[2][5][1-5])[.]){3}([0-9]|[0-9][0-9]|[1][0-9]{2}|[2][1-4][0-9]|[2][5][1-5])$";

static ALPHA_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-zA-Z0-9]+$").expect("alphanumeric pattern"));
static ALPHA_NUMERIC_WITH_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-zA-Z0-9 ]+$").expect("alphanumeric-with-space pattern"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern"));
static IPV4: LazyLock<Regex> = LazyLock::new(|| Regex::new(IPV4_PATTERN).expect("ipv4 pattern"));
static CONNECTION_STRING: LazyLock<Regex> = LazyLock::new(|| {
    // The dotted quad followed by a `:port` suffix.
    let pattern = format!("{}[:][0-9]+$", &IPV4_PATTERN[..IPV4_PATTERN.len() - 1]);
    Regex::new(&pattern).expect("connection string pattern")
});

/// Whether the string consists of ASCII letters and digits only.
pub fn is_alphanumeric(value: &str) -> bool {
    ALPHA_NUMERIC.is_match(value)
}

/// Whether the string consists of ASCII letters, digits, and spaces only.
pub fn is_alphanumeric_with_space(value: &str) -> bool {
    ALPHA_NUMERIC_WITH_SPACE.is_match(value)
}

/// Whether the string is a valid e-mail address per the HTML5 grammar.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// Whether the string is a dotted-quad IPv4 address.
pub fn is_valid_ipv4(value: &str) -> bool {
    IPV4.is_match(value)
}

/// Whether the string is in `ipv4-address:port` form.
pub fn is_valid_connection_string(value: &str) -> bool {
    CONNECTION_STRING.is_match(value)
}

/// Whether the string is empty or whitespace only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphanumeric() {
        assert!(is_alphanumeric("nicename1"));
        assert!(!is_alphanumeric("nice name"));
        assert!(!is_alphanumeric("nice-name"));
        assert!(!is_alphanumeric(""));
    }

    #[test]
    fn test_alphanumeric_with_space() {
        assert!(is_alphanumeric_with_space("What to Show"));
        assert!(is_alphanumeric_with_space("nicename"));
        assert!(!is_alphanumeric_with_space("what_to_show"));
        assert!(!is_alphanumeric_with_space("so, display"));
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("user@email.co"));
        assert!(is_valid_email("first.last+tag@sub.domain.org"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@email.co"));
        assert!(!is_valid_email("user email.co"));
    }

    #[test]
    fn test_connection_string() {
        assert!(is_valid_connection_string("127.0.0.1:30000"));
        assert!(is_valid_connection_string("192.168.1.10:4000"));
        assert!(!is_valid_connection_string("127.0.0.1"));
        assert!(!is_valid_connection_string("localhost:30000"));
        assert!(!is_valid_connection_string("127.0.0.1:"));
    }

    #[test]
    fn test_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   \t"));
        assert!(!is_blank(" x "));
    }
}
