use lazy_static::lazy_static;
use regex::Regex;

/// Checks that `email` looks like `local@domain.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.jp"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("test@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("test@example"));
        assert!(!is_valid_email("te st@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email(" "));
        assert!(!is_valid_email("\t\n"));
    }
}
