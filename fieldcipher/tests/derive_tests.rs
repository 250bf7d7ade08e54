//! Tests for `#[derive(Encrypted)]`.

use fieldcipher::entity::blind_index_column_name;
use fieldcipher::prelude::*;

#[derive(Debug, Default, Encrypted)]
#[encrypted(table = "patients")]
struct Patient {
    #[encrypted(
        blind_index(name = "last_four", transformer = "last-four-digits", bits = 16, fast),
        blind_index(name = "full", transformer = "digits-only"),
    )]
    ssn: Option<String>,
    #[blind_index]
    ssn_blind_index_last_four: Option<String>,
    #[blind_index(field = "ssn", name = "full")]
    ssn_lookup: Option<String>,
    #[encrypted]
    diagnosis: Option<String>,
    name: String,
}

#[derive(Debug, Default, Encrypted)]
struct CustomerNote {
    #[encrypted(blind_index(name = "initial", transformer = "first-character", fast = false))]
    r#type: Option<String>,
}

#[test]
fn test_declarations_follow_attributes() {
    let fields = Patient::encrypted_fields();
    assert_eq!(fields.len(), 2);

    let ssn = &fields[0];
    assert_eq!(ssn.storage_name(), "patients");
    assert_eq!(ssn.field_name(), "ssn");
    assert_eq!(ssn.blind_indexes().len(), 2);

    let last_four = &ssn.blind_indexes()[0];
    assert_eq!(last_four.name(), "last_four");
    assert_eq!(last_four.transformer(), Some("last-four-digits"));
    assert_eq!(last_four.bits(), 16);
    assert!(last_four.is_fast());

    let full = &ssn.blind_indexes()[1];
    assert_eq!(full.transformer(), Some("digits-only"));
    assert_eq!(full.bits(), 256);
    assert!(!full.is_fast());

    assert_eq!(fields[1].field_name(), "diagnosis");
    assert!(fields[1].blind_indexes().is_empty());
}

#[test]
fn test_slots_map_to_struct_fields() {
    let mut patient = Patient { name: "Ada".into(), ..Patient::default() };

    *patient.encrypted_value_mut("ssn").unwrap() = Some("123-45-6789".into());
    *patient.blind_index_slot_mut("ssn", "last_four").unwrap() = Some("a".into());
    *patient.blind_index_slot_mut("ssn", "full").unwrap() = Some("b".into());

    assert_eq!(patient.ssn.as_deref(), Some("123-45-6789"));
    assert_eq!(patient.ssn_blind_index_last_four.as_deref(), Some("a"));
    assert_eq!(patient.ssn_lookup.as_deref(), Some("b"));

    assert!(patient.encrypted_value_mut("name").is_none());
    assert!(patient.blind_index_slot_mut("diagnosis", "full").is_none());
    assert!(patient.blind_index_slot_mut("ssn", "middle").is_none());
}

#[test]
fn test_default_table_and_raw_identifiers() {
    let fields = CustomerNote::encrypted_fields();

    assert_eq!(fields[0].storage_name(), "customer_note");
    assert_eq!(fields[0].field_name(), "type");
    assert!(!fields[0].blind_indexes()[0].is_fast());

    let mut note = CustomerNote::default();
    assert!(note.encrypted_value_mut("type").is_some());
}

#[test]
fn test_back_column_naming() {
    assert_eq!(blind_index_column_name("ssn", "last_four"), "ssn_blind_index_last_four");
}

#[test]
fn test_derived_entity_round_trips_through_interceptor() {
    let interceptor = Interceptor::with_registry(
        CipherEngine::new(StaticKeyProvider::new(vec![9u8; 32])),
        TransformerRegistry::with_builtins(),
    );
    let mut patient = Patient {
        ssn: Some("123-45-6789".into()),
        diagnosis: Some("healthy".into()),
        name: "Ada".into(),
        ..Patient::default()
    };

    interceptor.on_before_create(&mut patient).unwrap();

    // 16 bits render as four hex digits
    assert_eq!(patient.ssn_blind_index_last_four.as_deref().map(str::len), Some(4));
    assert_eq!(
        patient.ssn_lookup,
        Some(interceptor.blind_index::<Patient>("ssn", "full", "123 45 6789").unwrap())
    );
    assert_ne!(patient.diagnosis.as_deref(), Some("healthy"));
    assert_eq!(patient.name, "Ada");

    interceptor.on_load(&mut patient).unwrap();
    assert_eq!(patient.ssn.as_deref(), Some("123-45-6789"));
    assert_eq!(patient.diagnosis.as_deref(), Some("healthy"));
}
