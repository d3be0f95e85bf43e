use std::str::FromStr;

use garde::Validate;
use serde::{Deserialize, Serialize};

/// E-mail address as entered by user, validated by garde.
///
/// Addresses are compared and stored in their normalized form, see [`ValidEmail::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[garde(transparent)]
pub struct ValidEmail(#[garde(email)] String);

impl ValidEmail {
    /// Trimmed and lowercased address
    pub fn normalized(&self) -> String {
        normalize_email(&self.0)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn cheat(email: String) -> Self {
        ValidEmail(email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl FromStr for ValidEmail {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = ValidEmail(s.trim().to_string());
        email.validate()?;
        Ok(email)
    }
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use fake::Fake as _;
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for ValidEmail {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let email: String = fake::faker::internet::en::SafeEmail().fake();
            ValidEmail(email)
        }
    }

    #[quickcheck]
    fn test_valid_email_arbitrary(valid_email: ValidEmail) -> bool {
        valid_email.validate().is_ok() && valid_email.normalized() == valid_email.normalized().to_lowercase()
    }

    #[test]
    fn test_valid_email() {
        let email = ValidEmail::from_str(" Reader@Example.com ").unwrap();
        assert_eq!(email.as_ref(), "Reader@Example.com");
        assert_eq!(email.normalized(), "reader@example.com");
    }

    #[test]
    fn test_invalid_email() {
        let email = ValidEmail::from_str("reader");
        assert!(email.is_err());

        let email = ValidEmail::cheat("reader".to_string());
        assert!(email.validate().is_err());
    }
}
