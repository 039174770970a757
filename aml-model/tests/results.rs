//! Result and fault behavior for aml-model

use aml_model::{items_to_aml, Cardinality, Element, Error, Item, ItemResult};

const FAULT_NO_ITEMS: &str = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <SOAP-ENV:Fault>
      <faultcode>0</faultcode>
      <faultstring>No items of type Part found.</faultstring>
    </SOAP-ENV:Fault>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

const FAULT_SERVER: &str = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <SOAP-ENV:Fault xmlns:af="http://www.aras.com/InnovatorFault">
      <faultcode>SOAP-ENV:Server</faultcode>
      <faultstring>Not enough permissions</faultstring>
      <detail><af:legacy_detail>Access denied for Part</af:legacy_detail></detail>
      <faultactor>ApplyItem</faultactor>
    </SOAP-ENV:Fault>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

// ============== Cardinality ==============

#[test]
fn zero_items_is_empty_cardinality() {
    let result = ItemResult::from_aml("<Result />").unwrap();
    assert!(matches!(result.cardinality(), Cardinality::Empty));
    assert_eq!(result.item_count(), 0);
    assert!(result.assert_items().unwrap().is_empty());

    let err = result.assert_item(Some("Part")).unwrap_err();
    assert!(err.is_no_items_found(), "expected NoItemsFound, got {err:?}");
}

#[test]
fn one_item_asserts_successfully() {
    let result = ItemResult::from_aml(r#"<Result><Item type="Part" id="1"><name>Bolt</name></Item></Result>"#).unwrap();
    assert!(matches!(result.cardinality(), Cardinality::One(_)));

    let item = result.assert_item(Some("Part")).unwrap();
    assert_eq!(item.id().as_deref(), Some("1"));
    assert_eq!(item.property("name").as_string(""), "Bolt");
}

#[test]
fn expected_type_mismatch_names_both_types() {
    let result = ItemResult::from_aml(r#"<Result><Item type="Part" id="1" /></Result>"#).unwrap();
    match result.assert_item(Some("Document")) {
        Err(Error::InvalidOperation(msg)) => {
            assert!(msg.contains("Document"));
            assert!(msg.contains("Part"));
        }
        other => panic!("expected InvalidOperation, got {other:?}"),
    }
}

#[test]
fn many_items_refuse_single_assertion() {
    let result = ItemResult::from_aml(
        r#"<Result><Item type="Part" id="1" /><Item type="Part" id="2" /><Item type="Part" id="3" /></Result>"#,
    )
    .unwrap();
    assert!(matches!(result.cardinality(), Cardinality::Many(ref items) if items.len() == 3));
    assert!(matches!(result.assert_item(None), Err(Error::InvalidOperation(_))));
    assert_eq!(result.assert_items().unwrap().len(), 3);
}

#[test]
fn nested_relationships_do_not_count_as_top_level_items() {
    let result = ItemResult::from_aml(
        r#"<Result><Item type="Part" id="1"><Relationships><Item type="Part BOM" id="2" /><Item type="Part BOM" id="3" /></Relationships></Item></Result>"#,
    )
    .unwrap();
    let part = result.assert_item(None).unwrap();
    assert_eq!(part.relationships().len(), 2);
}

#[test]
fn bare_item_document_has_one_item() {
    let result = ItemResult::from_aml(r#"<Item type="Part" id="1" />"#).unwrap();
    assert_eq!(result.item_count(), 1);
}

// ============== Faults ==============

#[test]
fn zero_count_fault_is_empty_not_failure() {
    let result = ItemResult::from_aml(FAULT_NO_ITEMS).unwrap();
    assert!(result.is_error());
    assert!(result.is_empty());
    assert!(result.assert_items().unwrap().is_empty());
    assert!(result.assert_no_error(true).is_ok());
    assert!(result.assert_no_error(false).unwrap_err().is_no_items_found());

    match result.assert_item(Some("Part")) {
        Err(Error::NoItemsFound { type_name, message }) => {
            assert_eq!(type_name.as_deref(), Some("Part"));
            assert_eq!(message, "No items of type Part found.");
        }
        other => panic!("expected NoItemsFound, got {other:?}"),
    }
}

#[test]
fn server_fault_surfaces_fields_verbatim() {
    let result = ItemResult::from_aml(FAULT_SERVER).unwrap();
    assert!(result.is_error());
    assert!(!result.is_empty());

    let fault = result.exception().unwrap();
    assert_eq!(fault.code(), "SOAP-ENV:Server");
    assert_eq!(fault.message(), "Not enough permissions");
    assert_eq!(fault.detail(), "Access denied for Part");
    assert_eq!(fault.source(), "ApplyItem");

    match result.assert_items() {
        Err(Error::Fault(info)) => assert_eq!(info.message, "Not enough permissions"),
        other => panic!("expected a fault, got {other:?}"),
    }
    assert!(result.assert_no_error(true).is_err());
}

#[test]
fn holding_a_fault_never_fails() {
    let result = ItemResult::from_fault("SOAP-ENV:Server", "boom");
    assert!(result.items().is_empty());
    assert!(result.value().is_none());
    assert_eq!(result.exception().unwrap().message(), "boom");
}

#[test]
fn no_items_found_builder_uses_zero_code() {
    let result = ItemResult::no_items_found("Part");
    assert!(result.is_empty());
    assert_eq!(result.exception().unwrap().code(), "0");
    assert!(result.to_aml().starts_with("<SOAP-ENV:Envelope"));
}

#[test]
fn message_follows_the_fault() {
    let result = ItemResult::from_fault("1", "failed");
    result.set_message("see server log").unwrap();
    let aml = result.to_aml();
    let fault_at = aml.find("</SOAP-ENV:Fault>").unwrap();
    let message_at = aml.find("<Message>see server log</Message>").unwrap();
    assert!(message_at > fault_at);
    assert_eq!(result.message().unwrap().text().as_deref(), Some("see server log"));
}

#[test]
fn message_on_plain_result_adds_an_envelope() {
    let result = ItemResult::from_aml(r#"<Result><Item type="Part" id="1" /></Result>"#).unwrap();
    result.set_message("warning").unwrap();
    let aml = result.to_aml();
    assert!(aml.starts_with("<SOAP-ENV:Envelope"));
    assert!(aml.contains("<Result><Item type=\"Part\" id=\"1\" /></Result><Message>warning</Message>"));
    assert_eq!(result.item_count(), 1);
}

// ============== Scalars & serialization ==============

#[test]
fn scalar_result_value() {
    let result = ItemResult::from_aml("<Result>42</Result>").unwrap();
    assert_eq!(result.value().as_deref(), Some("42"));
    assert!(matches!(result.cardinality(), Cardinality::Empty));

    assert_eq!(ItemResult::from_value("a<b").to_aml(), "<Result>a&lt;b</Result>");
}

#[test]
fn items_sharing_a_result_serialize_as_that_result() {
    let aml = r#"<Result><Item type="Part" id="1" /><Item type="Part" id="2" /></Result>"#;
    let result = ItemResult::from_aml(aml).unwrap();
    assert_eq!(items_to_aml(&result.items()), aml);
}

#[test]
fn unrelated_items_get_a_synthesized_result() {
    let a = Item::from_aml(r#"<Item type="Part" id="1" />"#).unwrap();
    let b = Item::from_aml(r#"<Item type="Part" id="2" />"#).unwrap();
    assert_eq!(
        items_to_aml(&[a.clone(), b]),
        r#"<Result><Item type="Part" id="1" /><Item type="Part" id="2" /></Result>"#
    );
    assert_eq!(items_to_aml(&[a]), r#"<Item type="Part" id="1" />"#);
}

#[test]
fn from_items_copies_into_one_result() {
    let a = Item::new(Some("Part"), Some("get"));
    let b = Item::new(Some("Document"), Some("get"));
    let result = ItemResult::from_items(vec![a, b]);
    let items = result.assert_items().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].type_name(), "Document");
}
