//! HostContext implementation over a reflected host object
//!
//! This is the single place where the shape of the legacy host is probed.
//! Every member name the adapter knows about is listed here; nothing else in
//! the crate touches [`HostObject`] directly.

use aml_host_traits::{
    CacheKind, Grant, HostCache, HostContext, HostError, HostFile, HostIdentity, HostObject, HostSession,
    HostValue, Member, MemberKind, Result,
};
use aml_model::{Document, Node};
use std::rc::Rc;

/// Methods returning a validate-user payload
pub const VALIDATE_USER_METHODS: &[&str] = &["ValidateUser", "GetValidateUserXmlResult"];
pub const DATABASE_MEMBERS: &[&str] = &["_database", "_databaseName", "Database"];
pub const USER_ID_MEMBERS: &[&str] = &["_userId", "_userID", "UserId"];
pub const VERSION_MEMBERS: &[&str] = &["_serverVersion", "_version", "Version"];
/// Sub-object holding language, locale and time zone
pub const SESSION_MEMBERS: &[&str] = &["_i18nContext", "I18NContext", "_sessionContext"];
pub const LANGUAGE_MEMBERS: &[&str] = &["LanguageCode", "_languageCode"];
pub const LOCALE_MEMBERS: &[&str] = &["Locale", "_locale"];
pub const TIME_ZONE_MEMBERS: &[&str] = &["TimeZone", "_timeZone", "TimeZoneName"];
/// Sub-object holding the application/session/request caches
pub const CALL_CONTEXT_MEMBERS: &[&str] = &["CallContext", "_callContext", "Context"];
pub const PERMISSION_MEMBERS: &[&str] = &["Permissions", "_permissions"];
pub const GRANT_METHODS: &[&str] = &["GrantIdentity", "Grant"];
pub const REVOKE_METHODS: &[&str] = &["RevokeGrantedIdentity", "Revoke"];
pub const SOAP_METHODS: &[&str] = &["CallAction", "ApplySOAP", "ApplySoap"];
pub const STORE_FILE_METHODS: &[&str] = &["StoreFile", "UploadFile"];
pub const FETCH_FILE_METHODS: &[&str] = &["FetchFile", "DownloadFile"];

const DATA_KINDS: &[MemberKind] = &[MemberKind::Field, MemberKind::Property];
const METHOD_KINDS: &[MemberKind] = &[MemberKind::Method];

/// First member named in `candidates` whose kind is one of `kinds`
fn find_member(obj: &dyn HostObject, candidates: &[&str], kinds: &[MemberKind]) -> Option<Member> {
    let members = obj.members();
    candidates.iter().find_map(|name| {
        members
            .iter()
            .find(|m| m.name == *name && kinds.contains(&m.kind))
            .cloned()
    })
}

fn read_value(obj: &dyn HostObject, candidates: &[&str]) -> Result<Option<HostValue>> {
    match find_member(obj, candidates, DATA_KINDS) {
        Some(member) => {
            let value = obj.get(&member.name)?;
            Ok((!value.is_null()).then_some(value))
        }
        None => Ok(None),
    }
}

fn read_text(obj: &dyn HostObject, candidates: &[&str]) -> Result<Option<String>> {
    read_value(obj, candidates)?.map(HostValue::into_text).transpose()
}

fn read_object(obj: &dyn HostObject, candidates: &[&str]) -> Result<Option<Rc<dyn HostObject>>> {
    read_value(obj, candidates)?.map(HostValue::into_object).transpose()
}

fn require_method(obj: &dyn HostObject, candidates: &[&str], what: &str) -> Result<Member> {
    find_member(obj, candidates, METHOD_KINDS).ok_or_else(|| {
        HostError::reflection(format!(
            "{} exposes no {} method (tried {})",
            obj.type_name(),
            what,
            candidates.join(", ")
        ))
    })
}

/// Adapter exposing a reflected host object as a [`HostContext`]
#[derive(Clone)]
pub struct ReflectedHost {
    host: Rc<dyn HostObject>,
}

impl ReflectedHost {
    pub fn new(host: Rc<dyn HostObject>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Rc<dyn HostObject> {
        &self.host
    }

    fn require_text(&self, candidates: &[&str], what: &str) -> Result<String> {
        read_text(self.host.as_ref(), candidates)?.ok_or_else(|| {
            HostError::reflection(format!(
                "cannot read the {} from {} (tried {})",
                what,
                self.host.type_name(),
                candidates.join(", ")
            ))
        })
    }

    fn session_from_fields(&self) -> Result<HostSession> {
        let Some(ctx) = read_object(self.host.as_ref(), SESSION_MEMBERS)? else {
            return Ok(HostSession::default());
        };
        let ctx = ctx.as_ref();
        Ok(HostSession {
            language_code: read_text(ctx, LANGUAGE_MEMBERS)?.unwrap_or_default(),
            locale: read_text(ctx, LOCALE_MEMBERS)?.unwrap_or_default(),
            time_zone: read_text(ctx, TIME_ZONE_MEMBERS)?.unwrap_or_default(),
        })
    }

    fn identity_from_fields(&self) -> Result<HostIdentity> {
        Ok(HostIdentity {
            database: self.require_text(DATABASE_MEMBERS, "database name")?,
            user_id: self.require_text(USER_ID_MEMBERS, "user id")?,
            version: self.require_text(VERSION_MEMBERS, "server version")?,
            session: self.session_from_fields()?,
        })
    }

    /// Read a validate-user result. Values the payload lacks are taken from
    /// the host fields.
    fn identity_from_payload(&self, payload: &str) -> Result<HostIdentity> {
        let doc = Document::parse(payload)
            .map_err(|e| HostError::reflection(format!("unreadable validate-user payload: {}", e)))?;
        let root = Node::from_document(doc);
        let text = |node: Node| node.text().map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

        let user_id = match text(root.element("id")) {
            Some(id) => id,
            None => self.require_text(USER_ID_MEMBERS, "user id")?,
        };
        let database = match text(root.element("database")) {
            Some(db) => db,
            None => self.require_text(DATABASE_MEMBERS, "database name")?,
        };
        let version = match text(root.element("server_version")) {
            Some(v) => v,
            None => self.require_text(VERSION_MEMBERS, "server version")?,
        };
        let i18n = root.element("i18nsessioncontext");
        let session = if i18n.exists() {
            HostSession {
                language_code: text(i18n.element("language_code")).unwrap_or_default(),
                locale: text(i18n.element("locale")).unwrap_or_default(),
                time_zone: text(i18n.element("time_zone")).unwrap_or_default(),
            }
        } else {
            self.session_from_fields()?
        };
        Ok(HostIdentity {
            database,
            user_id,
            version,
            session,
        })
    }

    fn permissions(&self) -> Result<Rc<dyn HostObject>> {
        read_object(self.host.as_ref(), PERMISSION_MEMBERS)?.ok_or_else(|| {
            HostError::reflection(format!("{} exposes no permission surface", self.host.type_name()))
        })
    }
}

impl HostContext for ReflectedHost {
    fn resolve_identity(&self) -> Result<HostIdentity> {
        let host = self.host.as_ref();
        if let Some(method) = find_member(host, VALIDATE_USER_METHODS, METHOD_KINDS) {
            tracing::debug!(method = %method.name, "resolving identity from validate-user payload");
            let payload = host.call(&method.name, &[])?.into_text()?;
            return self.identity_from_payload(&payload);
        }
        tracing::debug!(host = host.type_name(), "resolving identity from host fields");
        self.identity_from_fields()
    }

    fn cache(&self, kind: CacheKind) -> Result<Option<Box<dyn HostCache>>> {
        let Some(call_context) = read_object(self.host.as_ref(), CALL_CONTEXT_MEMBERS)? else {
            tracing::debug!(%kind, "host has no call context");
            return Ok(None);
        };
        let Some(store) = read_object(call_context.as_ref(), &[kind.host_member()])? else {
            tracing::debug!(%kind, "call context has no cache store");
            return Ok(None);
        };
        let indexer = store.first_member_of(MemberKind::Indexer).ok_or_else(|| {
            HostError::reflection(format!("{} cache {} exposes no indexer", kind, store.type_name()))
        })?;
        tracing::debug!(%kind, indexer = %indexer.name, "bound host cache");
        Ok(Some(Box::new(IndexedCache {
            store,
            indexer: indexer.name,
        })))
    }

    fn grant(&self, identity: &str) -> Result<Grant> {
        let permissions = self.permissions()?;
        let method = require_method(permissions.as_ref(), GRANT_METHODS, "grant")?;
        let handle = permissions.call(&method.name, &[HostValue::from(identity)])?;
        Ok(Grant {
            identity: identity.to_string(),
            handle,
        })
    }

    fn revoke(&self, grant: &Grant) -> Result<()> {
        let permissions = self.permissions()?;
        let method = require_method(permissions.as_ref(), REVOKE_METHODS, "revoke")?;
        permissions.call(&method.name, &[grant.handle.clone()])?;
        Ok(())
    }

    fn apply_soap(&self, action: &str, body: &str) -> Result<String> {
        let method = require_method(self.host.as_ref(), SOAP_METHODS, "SOAP")?;
        self.host
            .call(&method.name, &[HostValue::from(action), HostValue::from(body)])?
            .into_text()
    }

    fn store_file(&self, file: &HostFile, transaction: Option<&str>) -> Result<()> {
        let method = require_method(self.host.as_ref(), STORE_FILE_METHODS, "file store")?;
        let transaction = transaction.map_or(HostValue::Null, HostValue::from);
        self.host.call(
            &method.name,
            &[
                HostValue::from(file.id.as_str()),
                HostValue::from(file.name.as_str()),
                HostValue::Bytes(file.content.clone()),
                transaction,
            ],
        )?;
        Ok(())
    }

    fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let method = require_method(self.host.as_ref(), FETCH_FILE_METHODS, "file fetch")?;
        self.host.call(&method.name, &[HostValue::from(file_id)])?.into_bytes()
    }
}

/// Cache store accessed through the host's indexer member
struct IndexedCache {
    store: Rc<dyn HostObject>,
    indexer: String,
}

impl HostCache for IndexedCache {
    fn get(&self, key: &str) -> Result<Option<HostValue>> {
        let value = self.store.index_get(&self.indexer, key)?;
        Ok((!value.is_null()).then_some(value))
    }

    fn set(&self, key: &str, value: HostValue) -> Result<()> {
        self.store.index_set(&self.indexer, key, value)
    }
}
