/// Wrapper for secret key text that is zeroized on drop.
use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Private key material as read from config or the key file.
///
/// `Debug` never prints the contents.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveString(String);

impl SensitiveString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SensitiveString(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SensitiveString::from("0xdeadbeef");
        assert_eq!(secret.expose(), "0xdeadbeef");
        assert!(!format!("{secret:?}").contains("dead"));
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(SensitiveString::from("  \n").is_empty());
        assert!(!SensitiveString::from("ab").is_empty());
    }
}
