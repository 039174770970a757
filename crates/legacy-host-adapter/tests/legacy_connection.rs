//! Integration tests for legacy-host-adapter
//!
//! Every test runs the adapter against fake host objects that record the
//! members they are asked for.

mod common;

use aml_host_traits::{HostError, HostValue};
use aml_model::{
    Connection, ConnectionExt, Credentials, DownloadCommand, Error, Item, Password, UploadCommand, UploadStrategy,
    VaultConnection,
};
use common::{bare_host, entries, field_host, new_log, FakeObject, ONE_PART};
use legacy_host_adapter::{AdapterOptions, ConnectionState, LegacyConnection, ReflectedHost};

fn connect(host: FakeObject) -> LegacyConnection {
    LegacyConnection::new(ReflectedHost::new(host.into_host()))
}

// ============== Identity resolution ==============

#[test]
fn identity_resolves_lazily_and_once() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0 SP9"));
    assert_eq!(conn.state(), ConnectionState::Uninitialized);
    assert!(log.borrow().is_empty());

    assert_eq!(conn.database().unwrap(), "InnovatorSolutions");
    assert_eq!(conn.state(), ConnectionState::CredentialsResolved);
    assert_eq!(conn.user_id().unwrap(), "30B991F927274FA3829655F50C99472E");
    assert_eq!(conn.version().unwrap().major, 12);
    assert_eq!(conn.version().unwrap().service_pack, Some(9));

    let context = conn.context().unwrap();
    assert_eq!(context.language_code, "de");
    assert_eq!(context.utc_offset_minutes, 60);

    assert_eq!(entries(&log, &["get:_database"]).len(), 1);
}

#[test]
fn validate_user_payload_is_preferred_over_fields() {
    let log = new_log();
    let payload = r#"<Result>
        <id>PAYLOAD-USER</id>
        <database>FromPayload</database>
        <server_version>14.0</server_version>
        <i18nsessioncontext>
            <language_code>fr</language_code>
            <locale>fr-FR</locale>
            <time_zone>UTC</time_zone>
        </i18nsessioncontext>
    </Result>"#;
    let host = FakeObject::new("ModernConnection", &log)
        .field("_database", "FromFields")
        .field("_userId", "FIELD-USER")
        .field("_serverVersion", "11.0")
        .methods(&["ValidateUser"], move |_, _| Ok(HostValue::from(payload)));
    let conn = connect(host);

    assert_eq!(conn.database().unwrap(), "FromPayload");
    assert_eq!(conn.user_id().unwrap(), "PAYLOAD-USER");
    assert_eq!(conn.version().unwrap().major, 14);
    assert_eq!(conn.context().unwrap().language_code, "fr");
    assert!(entries(&log, &["get:_database"]).is_empty());
}

#[test]
fn payload_gaps_are_filled_from_fields() {
    let log = new_log();
    let host = FakeObject::new("ModernConnection", &log)
        .field("_database", "FromFields")
        .field("_serverVersion", "11.0 SP15")
        .methods(&["ValidateUser"], |_, _| Ok(HostValue::from("<Result><id>U7</id></Result>")));
    let conn = connect(host);

    assert_eq!(conn.user_id().unwrap(), "U7");
    assert_eq!(conn.database().unwrap(), "FromFields");
    // no session object anywhere: the default context applies
    assert_eq!(conn.context().unwrap().language_code, "en");
}

#[test]
fn unknown_host_shape_is_a_hard_error() {
    let log = new_log();
    let conn = connect(FakeObject::new("Mystery", &log).field("_something", "else"));
    let err = conn.database().unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));
    assert!(err.to_string().contains("database name"));
    assert_eq!(conn.state(), ConnectionState::Uninitialized);
}

// ============== Caches ==============

#[test]
fn caches_bind_through_the_indexer() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));

    let app = conn.application_cache().unwrap().expect("application cache");
    app.set("counter", HostValue::Int(3)).unwrap();
    assert!(matches!(app.get("counter").unwrap(), Some(HostValue::Int(3))));
    assert!(app.get("missing").unwrap().is_none());

    let session = conn.session_cache().unwrap().expect("session cache");
    assert!(session.get("counter").unwrap().is_none());
    assert!(conn.request_cache().unwrap().is_some());

    conn.application_cache().unwrap();
    conn.session_cache().unwrap();
    assert_eq!(entries(&log, &["get:CallContext"]).len(), 3, "one lookup per cache kind, built once");
}

#[test]
fn missing_call_context_yields_no_cache() {
    let log = new_log();
    let conn = connect(bare_host(&log));
    assert!(conn.application_cache().unwrap().is_none());
    assert!(conn.session_cache().unwrap().is_none());
    assert!(conn.request_cache().unwrap().is_none());
}

#[test]
fn cache_store_without_indexer_is_an_error() {
    let log = new_log();
    let call_context = FakeObject::new("CallContext", &log).object("Application", FakeObject::new("AppState", &log));
    let host = FakeObject::new("OddConnection", &log).object("CallContext", call_context);
    let conn = connect(host);
    assert!(matches!(conn.application_cache(), Err(Error::Adapter(_))));
}

// ============== Escalation ==============

#[test]
fn escalation_revokes_in_grant_order() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    {
        let guard = conn.escalate(["Admin", "Root"]).unwrap();
        assert_eq!(guard.identities().collect::<Vec<_>>(), vec!["Admin", "Root"]);
        assert_eq!(entries(&log, &["revoke:"]).len(), 0);
    }
    assert_eq!(
        entries(&log, &["grant:", "revoke:"]),
        vec!["grant:Admin", "grant:Root", "revoke:Admin", "revoke:Root"]
    );
}

#[test]
fn nested_escalations_each_revoke_once() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    {
        let _outer = conn.escalate(["Admin"]).unwrap();
        {
            let _inner = conn.escalate(["Root"]).unwrap();
        }
        assert_eq!(entries(&log, &["revoke:"]), vec!["revoke:Root"]);
    }
    assert_eq!(
        entries(&log, &["grant:", "revoke:"]),
        vec!["grant:Admin", "grant:Root", "revoke:Root", "revoke:Admin"]
    );
}

#[test]
fn escalation_is_revoked_on_error_paths() {
    fn privileged_work(conn: &LegacyConnection) -> Result<(), Error> {
        let _guard = conn.escalate(["Admin", "Root"])?;
        Err(Error::invalid_operation("work failed"))
    }

    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    assert!(privileged_work(&conn).is_err());
    assert_eq!(entries(&log, &["revoke:"]), vec!["revoke:Admin", "revoke:Root"]);
}

#[test]
fn partial_grant_failure_revokes_what_was_granted() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    let err = conn.escalate(["Admin", "Broken", "Root"]).unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));
    assert_eq!(entries(&log, &["grant:", "revoke:"]), vec!["grant:Admin", "revoke:Admin"]);
}

#[test]
fn explicit_release_does_not_revoke_twice() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    let guard = conn.escalate(["Admin"]).unwrap();
    guard.release().unwrap();
    assert_eq!(entries(&log, &["revoke:"]), vec!["revoke:Admin"]);
}

// ============== Login ==============

#[test]
fn login_accepts_anonymous_and_hashed_credentials() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    conn.login(&Credentials::Anonymous {
        database: "InnovatorSolutions".into(),
    })
    .unwrap();
    assert_eq!(conn.state(), ConnectionState::Active);

    conn.login(&Credentials::Explicit {
        database: "innovatorsolutions".into(),
        username: "admin".into(),
        password: Password::Md5Hash("607920b64fe136f9ab2389e371852af2".into()),
    })
    .unwrap();
}

#[test]
fn login_rejects_unverifiable_credentials() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));

    let windows = Credentials::Windows {
        database: "InnovatorSolutions".into(),
    };
    let token = Credentials::Token {
        database: "InnovatorSolutions".into(),
        token: "abc".into(),
    };
    let plain = Credentials::Explicit {
        database: "InnovatorSolutions".into(),
        username: "admin".into(),
        password: Password::Plain("innovator".into()),
    };
    for creds in [windows, token, plain] {
        assert!(matches!(conn.login(&creds), Err(Error::UnsupportedCredential(_))), "{creds:?}");
    }
    assert_eq!(conn.state(), ConnectionState::Uninitialized);

    let other_db = Credentials::Anonymous { database: "Other".into() };
    assert!(matches!(conn.login(&other_db), Err(Error::Argument(_))));
    assert_eq!(conn.state(), ConnectionState::CredentialsResolved);
}

// ============== Requests ==============

#[test]
fn apply_goes_through_the_host_soap_method() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    let result = conn.apply(&Item::new(Some("Part"), Some("get"))).unwrap();
    assert_eq!(conn.state(), ConnectionState::Active);
    assert_eq!(entries(&log, &["soap:"]), vec!["soap:ApplyItem"]);

    let part = result.assert_item(Some("Part")).unwrap();
    assert_eq!(part.property("name").as_string(""), "Bolt");
    assert_eq!(aml_model::Element::node(&part).context().language_code, "de");
}

#[test]
fn next_sequence_reads_scalar_result() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    assert_eq!(conn.next_sequence("Part Number").unwrap(), "PN-0042");
}

#[test]
fn host_invocation_failures_propagate() {
    let log = new_log();
    let host = FakeObject::new("FailingConnection", &log)
        .field("_database", "db")
        .field("_userId", "u")
        .field("_serverVersion", "12.0")
        .methods(&["CallAction"], |_, _| Err(HostError::invocation("socket closed")));
    let conn = connect(host);
    let err = conn.apply("<AML />").unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));
    assert!(err.to_string().contains("socket closed"));
}

// ============== Vault ==============

fn upload_command(file_id: &str) -> UploadCommand {
    let mut command = UploadCommand::new(ONE_PART);
    command.add_file(file_id, "drawing.pdf", b"%PDF".to_vec());
    command
}

#[test]
fn upload_strategy_follows_server_version() {
    let log = new_log();
    assert_eq!(
        connect(field_host(&log, "12.0")).upload_strategy().unwrap(),
        UploadStrategy::Transactional
    );
    assert_eq!(
        connect(field_host(&log, "9.4.0")).upload_strategy().unwrap(),
        UploadStrategy::NonTransactional
    );

    let strict = LegacyConnection::with_options(
        ReflectedHost::new(field_host(&log, "12.0").into_host()),
        AdapterOptions {
            transactional_upload_min_major: 13,
        },
    );
    assert_eq!(strict.upload_strategy().unwrap(), UploadStrategy::NonTransactional);
}

#[tokio::test]
async fn transactional_upload_commits() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0 SP9"));
    let result = conn.upload(&upload_command("F1")).await.unwrap();
    assert_eq!(result.item_count(), 1);
    assert_eq!(
        entries(&log, &["soap:", "store:"]),
        vec![
            "soap:BeginTransaction",
            "store:F1:TX1",
            "soap:ApplyAML",
            "soap:CommitTransaction"
        ]
    );
}

#[tokio::test]
async fn failed_store_rolls_back() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    let err = conn.upload(&upload_command("bad")).await.unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));
    assert_eq!(
        entries(&log, &["soap:"]),
        vec!["soap:BeginTransaction", "soap:RollbackTransaction"]
    );
}

#[tokio::test]
async fn legacy_upload_stores_then_applies() {
    let log = new_log();
    let conn = connect(field_host(&log, "9.4"));
    conn.upload(&upload_command("F1")).await.unwrap();
    assert_eq!(entries(&log, &["soap:", "store:"]), vec!["store:F1:-", "soap:ApplyAML"]);
}

#[tokio::test]
async fn download_fetches_file_content() {
    let log = new_log();
    let conn = connect(field_host(&log, "12.0"));
    let bytes = conn.download(&DownloadCommand::new("F1")).await.unwrap();
    assert_eq!(bytes, b"file content");
    assert_eq!(entries(&log, &["fetch:"]), vec!["fetch:F1"]);
}
