//! Scoped privilege escalation

use aml_host_traits::{Grant, HostContext, Result};

/// Identities granted for the lifetime of the guard.
///
/// Grants are taken in order on construction and revoked in the same order
/// exactly once, when the guard is released or dropped. If a grant fails
/// part way, the identities already granted are revoked before the error is
/// returned. Guards are expected to nest LIFO on one thread.
pub struct Escalation<'a> {
    host: &'a dyn HostContext,
    grants: Vec<Grant>,
}

impl<'a> Escalation<'a> {
    pub fn new<I, S>(host: &'a dyn HostContext, identities: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = Self {
            host,
            grants: Vec::new(),
        };
        for identity in identities {
            let grant = host.grant(identity.as_ref())?;
            tracing::debug!(identity = %grant.identity, "granted identity");
            guard.grants.push(grant);
        }
        Ok(guard)
    }

    /// Identities currently held, in grant order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.grants.iter().map(|g| g.identity.as_str())
    }

    /// Revoke every grant now, reporting the first failure. Remaining grants
    /// are still revoked after a failure.
    pub fn release(mut self) -> Result<()> {
        let mut first_error = None;
        for grant in std::mem::take(&mut self.grants) {
            if let Err(e) = self.revoke(&grant) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn revoke(&self, grant: &Grant) -> Result<()> {
        self.host.revoke(grant)?;
        tracing::debug!(identity = %grant.identity, "revoked identity");
        Ok(())
    }
}

impl Drop for Escalation<'_> {
    fn drop(&mut self) {
        for grant in std::mem::take(&mut self.grants) {
            if let Err(e) = self.revoke(&grant) {
                tracing::warn!(identity = %grant.identity, error = %e, "failed to revoke identity");
            }
        }
    }
}

impl std::fmt::Debug for Escalation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Escalation")
            .field("identities", &self.identities().collect::<Vec<_>>())
            .finish()
    }
}
