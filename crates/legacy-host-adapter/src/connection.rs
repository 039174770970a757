//! Connection running the AML model against a legacy host

use crate::escalate::Escalation;
use crate::options::AdapterOptions;
use aml_host_traits::{CacheKind, HostCache, HostContext, HostError, HostFile, HostIdentity};
use aml_model::{
    Command, Connection, ConnectionExt, Credentials, Document, DownloadCommand, Error, ItemResult, Password,
    Result, ServerContext, ServerVersion, SoapAction, UploadCommand, UploadStrategy, VaultConnection,
};
use async_trait::async_trait;
use once_cell::unsync::OnceCell;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

const BEGIN_TRANSACTION: &str = "BeginTransaction";
const COMMIT_TRANSACTION: &str = "CommitTransaction";
const ROLLBACK_TRANSACTION: &str = "RollbackTransaction";

/// Lifecycle of a [`LegacyConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing has been read from the host yet
    Uninitialized,
    /// Identity and session context have been resolved
    CredentialsResolved,
    /// A login was accepted or a request was sent
    Active,
}

/// Facts resolved from the host once per connection
#[derive(Debug)]
struct Resolved {
    identity: HostIdentity,
    version: ServerVersion,
    context: Arc<ServerContext>,
}

fn host_error(err: HostError) -> Error {
    Error::adapter(err)
}

/// A [`Connection`] backed by a [`HostContext`].
///
/// Identity, session context and cache handles are resolved on first use and
/// kept for the connection's lifetime. Host reflection failures surface as
/// [`Error::Adapter`].
pub struct LegacyConnection {
    host: Box<dyn HostContext>,
    options: AdapterOptions,
    state: Cell<ConnectionState>,
    resolved: OnceCell<Resolved>,
    caches: OnceCell<HashMap<CacheKind, Box<dyn HostCache>>>,
}

impl LegacyConnection {
    pub fn new<H: HostContext + 'static>(host: H) -> Self {
        Self::with_options(host, AdapterOptions::default())
    }

    pub fn with_options<H: HostContext + 'static>(host: H, options: AdapterOptions) -> Self {
        Self {
            host: Box::new(host),
            options,
            state: Cell::new(ConnectionState::Uninitialized),
            resolved: OnceCell::new(),
            caches: OnceCell::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    fn resolved(&self) -> Result<&Resolved> {
        let resolved = self.resolved.get_or_try_init(|| {
            let identity = self.host.resolve_identity().map_err(host_error)?;
            let version = ServerVersion::parse(&identity.version)?;
            let context = Arc::new(session_context(&identity));
            tracing::debug!(
                database = %identity.database,
                %version,
                language = %context.language_code,
                "resolved host identity"
            );
            Ok::<_, Error>(Resolved {
                identity,
                version,
                context,
            })
        })?;
        if self.state.get() == ConnectionState::Uninitialized {
            self.state.set(ConnectionState::CredentialsResolved);
        }
        Ok(resolved)
    }

    fn activate(&self) -> Result<&Resolved> {
        let resolved = self.resolved()?;
        self.state.set(ConnectionState::Active);
        Ok(resolved)
    }

    /// Accept credentials for the session the host already holds.
    ///
    /// The host performs no authentication of its own here, so only shapes
    /// that can be checked locally are accepted.
    pub fn login(&self, credentials: &Credentials) -> Result<()> {
        match credentials {
            Credentials::Anonymous { .. } => {}
            Credentials::Explicit {
                password: Password::Md5Hash(_),
                ..
            } => {}
            Credentials::Explicit {
                password: Password::Plain(_),
                ..
            } => {
                return Err(Error::UnsupportedCredential(
                    "plain-text passwords cannot be hashed by the legacy adapter".to_string(),
                ))
            }
            other => {
                return Err(Error::UnsupportedCredential(format!(
                    "{} credentials are not supported by the legacy adapter",
                    other.kind()
                )))
            }
        }
        let resolved = self.resolved()?;
        if !credentials.database().eq_ignore_ascii_case(&resolved.identity.database) {
            return Err(Error::argument(format!(
                "database '{}' does not match the host database '{}'",
                credentials.database(),
                resolved.identity.database
            )));
        }
        tracing::debug!(kind = credentials.kind(), "login accepted");
        self.state.set(ConnectionState::Active);
        Ok(())
    }

    fn caches(&self) -> Result<&HashMap<CacheKind, Box<dyn HostCache>>> {
        self.caches.get_or_try_init(|| {
            let mut caches = HashMap::new();
            for kind in CacheKind::ALL {
                if let Some(cache) = self.host.cache(kind).map_err(host_error)? {
                    caches.insert(kind, cache);
                }
            }
            Ok::<_, Error>(caches)
        })
    }

    /// Cache of the given kind; `None` when the host has no call context
    pub fn cache(&self, kind: CacheKind) -> Result<Option<&dyn HostCache>> {
        Ok(self.caches()?.get(&kind).map(|c| &**c))
    }

    pub fn application_cache(&self) -> Result<Option<&dyn HostCache>> {
        self.cache(CacheKind::Application)
    }

    pub fn session_cache(&self) -> Result<Option<&dyn HostCache>> {
        self.cache(CacheKind::Session)
    }

    pub fn request_cache(&self) -> Result<Option<&dyn HostCache>> {
        self.cache(CacheKind::Request)
    }

    /// Grant identities until the returned guard goes out of scope
    pub fn escalate<I, S>(&self, identities: I) -> Result<Escalation<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Escalation::new(self.host.as_ref(), identities).map_err(host_error)
    }

    /// Upload strategy for the host's server version
    pub fn upload_strategy(&self) -> Result<UploadStrategy> {
        let version = self.resolved()?.version;
        Ok(UploadStrategy::for_version(
            &version,
            self.options.transactional_upload_min_major,
        ))
    }

    fn store_files(&self, command: &UploadCommand, transaction: Option<&str>) -> Result<()> {
        for file in &command.files {
            let host_file = HostFile {
                id: file.id.clone(),
                name: file.name.clone(),
                content: file.content.clone(),
            };
            self.host.store_file(&host_file, transaction).map_err(host_error)?;
        }
        Ok(())
    }

    fn transaction_call(&self, action: &str, transaction: &str) -> Result<String> {
        self.host.apply_soap(action, transaction).map_err(host_error)
    }

    fn upload_in_transaction(&self, command: &UploadCommand) -> Result<ItemResult> {
        let response = self.transaction_call(BEGIN_TRANSACTION, "")?;
        let transaction = ItemResult::from_aml(&response)?
            .value()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::invalid_operation("host did not open a transaction"))?;
        tracing::debug!(%transaction, files = command.files.len(), "uploading in transaction");

        let outcome = self
            .store_files(command, Some(&transaction))
            .and_then(|_| self.apply(Command::new(command.aml.as_str()).with_action(SoapAction::ApplyAml)));
        match outcome {
            Ok(result) if !result.is_error() => {
                self.transaction_call(COMMIT_TRANSACTION, &transaction)?;
                Ok(result)
            }
            other => {
                if let Err(e) = self.transaction_call(ROLLBACK_TRANSACTION, &transaction) {
                    tracing::warn!(%transaction, error = %e, "failed to roll back upload transaction");
                }
                other
            }
        }
    }

    fn upload_directly(&self, command: &UploadCommand) -> Result<ItemResult> {
        tracing::debug!(files = command.files.len(), "uploading without transaction");
        self.store_files(command, None)?;
        self.apply(Command::new(command.aml.as_str()).with_action(SoapAction::ApplyAml))
    }
}

fn session_context(identity: &HostIdentity) -> ServerContext {
    let defaults = ServerContext::default();
    let pick = |value: &str, fallback: String| {
        if value.trim().is_empty() {
            fallback
        } else {
            value.to_string()
        }
    };
    let session = &identity.session;
    ServerContext::new(
        pick(&session.language_code, defaults.language_code),
        pick(&session.locale, defaults.locale),
        pick(&session.time_zone, defaults.time_zone),
    )
}

#[async_trait(?Send)]
impl Connection for LegacyConnection {
    fn process(&self, command: &Command) -> Result<Document> {
        let resolved = self.activate()?;
        let response = self
            .host
            .apply_soap(command.action().as_str(), command.aml())
            .map_err(host_error)?;
        Document::parse_with_context(&response, Arc::clone(&resolved.context))
    }

    fn next_sequence(&self, name: &str) -> Result<String> {
        let body = format!("<Item><name>{}</name></Item>", aml_model::document::escape_text(name));
        let result = self.apply(Command::new(body).with_action(SoapAction::GetNextSequence))?;
        result.assert_no_error(false)?;
        result
            .value()
            .ok_or_else(|| Error::invalid_operation(format!("no value returned for sequence '{}'", name)))
    }

    fn user_id(&self) -> Result<String> {
        Ok(self.resolved()?.identity.user_id.clone())
    }

    fn database(&self) -> Result<String> {
        Ok(self.resolved()?.identity.database.clone())
    }

    fn version(&self) -> Result<ServerVersion> {
        Ok(self.resolved()?.version)
    }

    fn context(&self) -> Result<Arc<ServerContext>> {
        Ok(Arc::clone(&self.resolved()?.context))
    }
}

#[async_trait(?Send)]
impl VaultConnection for LegacyConnection {
    async fn upload(&self, command: &UploadCommand) -> Result<ItemResult> {
        match self.upload_strategy()? {
            UploadStrategy::Transactional => self.upload_in_transaction(command),
            UploadStrategy::NonTransactional => self.upload_directly(command),
        }
    }

    async fn download(&self, command: &DownloadCommand) -> Result<Vec<u8>> {
        self.activate()?;
        self.host.fetch_file(&command.file_id).map_err(host_error)
    }
}
