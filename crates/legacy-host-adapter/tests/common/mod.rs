//! In-memory stand-ins for a reflected legacy host

#![allow(dead_code)]

use aml_host_traits::{HostError, HostObject, HostValue, Member, MemberKind, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type Log = Rc<RefCell<Vec<String>>>;
type Handler = Box<dyn Fn(&str, &[HostValue]) -> Result<HostValue>>;

pub const ONE_PART: &str = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><Result><Item type="Part" id="P1"><name>Bolt</name></Item></Result></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Log entries starting with any of the prefixes, in order
pub fn entries(log: &Log, prefixes: &[&str]) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|e| prefixes.iter().any(|p| e.starts_with(p)))
        .cloned()
        .collect()
}

/// Host object assembled member by member. Every read, call and indexer
/// access is recorded in the shared log.
pub struct FakeObject {
    type_name: String,
    members: Vec<Member>,
    values: HashMap<String, HostValue>,
    index: RefCell<HashMap<String, HostValue>>,
    handler: Option<Handler>,
    log: Log,
}

impl FakeObject {
    pub fn new(type_name: &str, log: &Log) -> Self {
        Self {
            type_name: type_name.to_string(),
            members: Vec::new(),
            values: HashMap::new(),
            index: RefCell::new(HashMap::new()),
            handler: None,
            log: Rc::clone(log),
        }
    }

    pub fn field<V: Into<HostValue>>(mut self, name: &str, value: V) -> Self {
        self.members.push(Member::private(name, MemberKind::Field));
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn property<V: Into<HostValue>>(mut self, name: &str, value: V) -> Self {
        self.members.push(Member::public(name, MemberKind::Property));
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn object(mut self, name: &str, object: FakeObject) -> Self {
        self.members.push(Member::public(name, MemberKind::Property));
        self.values
            .insert(name.to_string(), HostValue::Object(Rc::new(object)));
        self
    }

    pub fn indexer(mut self, name: &str) -> Self {
        self.members.push(Member::public(name, MemberKind::Indexer));
        self
    }

    pub fn methods<F>(mut self, names: &[&str], handler: F) -> Self
    where
        F: Fn(&str, &[HostValue]) -> Result<HostValue> + 'static,
    {
        for name in names {
            self.members.push(Member::public(*name, MemberKind::Method));
        }
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn into_host(self) -> Rc<dyn HostObject> {
        Rc::new(self)
    }

    fn record(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

impl HostObject for FakeObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<Member> {
        self.members.clone()
    }

    fn get(&self, member: &str) -> Result<HostValue> {
        self.record(format!("get:{}", member));
        self.values
            .get(member)
            .cloned()
            .ok_or_else(|| HostError::missing_member(member))
    }

    fn call(&self, method: &str, args: &[HostValue]) -> Result<HostValue> {
        match &self.handler {
            Some(handler) if self.member(method).is_some() => handler(method, args),
            _ => Err(HostError::missing_member(method)),
        }
    }

    fn index_get(&self, indexer: &str, key: &str) -> Result<HostValue> {
        self.record(format!("index_get:{}", key));
        if self.member(indexer).is_none() {
            return Err(HostError::missing_member(indexer));
        }
        Ok(self.index.borrow().get(key).cloned().unwrap_or_default())
    }

    fn index_set(&self, indexer: &str, key: &str, value: HostValue) -> Result<()> {
        self.record(format!("index_set:{}", key));
        if self.member(indexer).is_none() {
            return Err(HostError::missing_member(indexer));
        }
        self.index.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

fn text_arg(args: &[HostValue], i: usize) -> String {
    args.get(i).and_then(HostValue::as_text).unwrap_or_default()
}

fn permissions(log: &Log) -> FakeObject {
    let calls = Rc::clone(log);
    FakeObject::new("Permissions", log).methods(&["GrantIdentity", "RevokeGrantedIdentity"], move |method, args| {
        let identity = text_arg(args, 0);
        match method {
            "GrantIdentity" if identity == "Broken" => Err(HostError::invocation("identity does not exist")),
            "GrantIdentity" => {
                calls.borrow_mut().push(format!("grant:{}", identity));
                Ok(HostValue::from(identity))
            }
            _ => {
                calls.borrow_mut().push(format!("revoke:{}", identity));
                Ok(HostValue::Null)
            }
        }
    })
}

fn cache_store(name: &str, log: &Log) -> FakeObject {
    FakeObject::new(&format!("{}State", name), log).indexer("Item")
}

pub fn call_context(log: &Log) -> FakeObject {
    FakeObject::new("CallContext", log)
        .object("Application", cache_store("Application", log))
        .object("Session", cache_store("Session", log))
        .object("Request", cache_store("Request", log))
}

fn session(log: &Log) -> FakeObject {
    FakeObject::new("I18NSessionContext", log)
        .property("LanguageCode", "de")
        .property("Locale", "de-DE")
        .property("TimeZone", "GMT+01:00")
}

/// Answers for the SOAP, file store and file fetch methods
fn server_methods(log: &Log) -> impl Fn(&str, &[HostValue]) -> Result<HostValue> + 'static {
    let calls = Rc::clone(log);
    move |method, args| match method {
        "CallAction" => {
            let action = text_arg(args, 0);
            calls.borrow_mut().push(format!("soap:{}", action));
            let reply = match action.as_str() {
                "BeginTransaction" => "<Result>TX1</Result>",
                "CommitTransaction" | "RollbackTransaction" => "<Result />",
                "GetNextSequence" => "<Result>PN-0042</Result>",
                _ => ONE_PART,
            };
            Ok(HostValue::from(reply))
        }
        "StoreFile" => {
            let id = text_arg(args, 0);
            if id == "bad" {
                return Err(HostError::invocation("vault rejected the file"));
            }
            let transaction = args.get(3).and_then(HostValue::as_text).unwrap_or_else(|| "-".to_string());
            calls.borrow_mut().push(format!("store:{}:{}", id, transaction));
            Ok(HostValue::Null)
        }
        "FetchFile" => {
            calls.borrow_mut().push(format!("fetch:{}", text_arg(args, 0)));
            Ok(HostValue::Bytes(b"file content".to_vec()))
        }
        other => Err(HostError::missing_member(other)),
    }
}

/// A host exposing its identity through private fields
pub fn field_host(log: &Log, version: &str) -> FakeObject {
    FakeObject::new("InnovatorServerConnection", log)
        .field("_database", "InnovatorSolutions")
        .field("_userId", "30B991F927274FA3829655F50C99472E")
        .field("_serverVersion", version)
        .object("_i18nContext", session(log))
        .object("CallContext", call_context(log))
        .object("Permissions", permissions(log))
        .methods(&["CallAction", "StoreFile", "FetchFile"], server_methods(log))
}

/// A host without a call context or session object
pub fn bare_host(log: &Log) -> FakeObject {
    FakeObject::new("BareConnection", log)
        .field("_database", "InnovatorSolutions")
        .field("_userId", "U1")
        .field("_serverVersion", "11.0 SP15")
        .object("Permissions", permissions(log))
        .methods(&["CallAction", "StoreFile", "FetchFile"], server_methods(log))
}
