use std::collections::HashSet;

use crate::general::normalize_email;

/// Decides who holds administrative capability.
///
/// Admins are identified by e-mail address, the allow-list comes from
/// configuration. This is the only place where the decision is made.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: HashSet<String>,
}

impl AdminPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| normalize_email(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        AdminPolicy { emails }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    pub fn admins_count(&self) -> usize {
        self.emails.len()
    }
}
