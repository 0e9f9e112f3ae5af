//! End-to-end workflows against the schema tables in `tests/data`.

use std::path::PathBuf;
use std::sync::Arc;

use hl7_engine::hl7_types::{StructureKind, Version};
use hl7_engine::{
    discover_schema_files, parse, parse_auto, parse_batch, Definition, Hl7Error, Message, Navigate,
    ParseOptions, Parser, SchemaConfig, SchemaProvider, SchemaStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DRC_MESSAGE: &str = "MSH|^~\\&|LAB|HOSP|BANK|HOSP|20240131120000||DRC^O47^DRC_O47|MSG0001|P|2.8\r\
NTE|1||Donor consent on file\r\
ORC|NW|D100^LAB\r\
TQ1|1||||||20240201080000\r\
TQ2|1\r\
OBR|1|D100^LAB||BLD^Whole blood\r\
NTE|1||Handle with care\r\
ORC|NW|D101^LAB\r\
OBR|1|D101^LAB\r";

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hl7_engine=warn".into()),
        )
        .try_init();
}

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn provider() -> Arc<dyn SchemaProvider> {
    init_tracing();
    Arc::new(SchemaStore::load(data_dir()).unwrap())
}

#[test]
fn test_load_schema_tables() {
    init_tracing();
    let files = discover_schema_files(data_dir()).unwrap();
    assert!(files.versions[&Version::V2_8].is_complete());

    let store = SchemaStore::from_files(&files, &SchemaConfig::default()).unwrap();
    assert_eq!(store.versions(), vec![Version::V2_8]);
    assert_eq!(store.group_count(), 3);
    assert!(store.contains("TQ2", Version::V2_8));

    let msh = store.lookup_segment("MSH", Version::V2_8).unwrap();
    assert_eq!(msh.field_number("message type"), Some(9));

    let Some(Definition::Group(order)) = store.lookup_structure("DRC_O47_DONATION_ORDER", Version::V2_8)
    else {
        panic!("donation order group missing");
    };
    assert_eq!(order.child_named("NTE2").map(|child| child.structure.as_str()), Some("NTE"));

    let json = serde_json::to_string(&*order).unwrap();
    assert!(json.contains("DRC_O47_TIMING"));
}

#[test]
fn test_parse_nested_groups_round_trip() {
    let msg = parse(DRC_MESSAGE, provider(), Version::V2_8).unwrap();
    assert_eq!(msg.structure(), "DRC_O47");
    assert_eq!(msg.encode(), DRC_MESSAGE);

    let orders = msg.root().get_all("DONATION_ORDER").unwrap();
    assert_eq!(orders.len(), 2);
    let first = orders[0].as_group().unwrap();
    assert_eq!(first.repetitions("TIMING").unwrap(), 1);
    assert_eq!(first.repetitions("NTE2").unwrap(), 1);
    assert_eq!(first.child("TIMING", 0).map(|node| node.kind()), Some(StructureKind::Group));
}

#[test]
fn test_location_reads() {
    let msg = parse_auto(DRC_MESSAGE, provider()).unwrap();
    assert_eq!(msg.version(), Version::V2_8);

    assert_eq!(
        msg.get("/DONATION_ORDER(0)/TIMING/TQ1-7").unwrap().as_deref(),
        Some("20240201080000")
    );
    assert_eq!(msg.get("/DONATION_ORDER(1)/ORC-2-1").unwrap().as_deref(), Some("D101"));
    assert_eq!(msg.get("OBR-4-2").unwrap().as_deref(), Some("Whole blood"));
    assert_eq!(msg.get("MSH-9-3").unwrap().as_deref(), Some("DRC_O47"));

    // absent structures read as None and are not created
    assert_eq!(msg.get("/DONATION_ORDER(1)/TIMING/TQ1-7").unwrap(), None);
    assert_eq!(msg.encode(), DRC_MESSAGE);

    assert!(matches!(msg.get("/NOPE/ORC-1"), Err(Hl7Error::NoSuchChild { .. })));
}

#[test]
fn test_build_message_from_skeleton() {
    let mut msg = Message::new("DRC_O47", Version::V2_8, provider()).unwrap();
    msg.set("MSH-10", "CTRL42").unwrap();
    msg.set("NTE-3", "lot 7|8").unwrap();
    msg.set("/DONATION_ORDER(0)/ORC-1", "NW").unwrap();
    msg.set("/DONATION_ORDER(0)/TIMING(0)/TQ1-7", "20240301").unwrap();
    msg.set("/DONATION_ORDER(1)/ORC-1", "CA").unwrap();

    assert_eq!(
        msg.encode(),
        "MSH|^~\\&#|||||||DRC^O47^DRC_O47|CTRL42||2.8\r\
         NTE|||lot 7\\F\\8\r\
         ORC|NW\r\
         TQ1|||||||20240301\r\
         ORC|CA\r"
    );
    assert_eq!(msg.get("NTE-3").unwrap().as_deref(), Some("lot 7|8"));

    // two past the end is rejected and leaves the tree alone
    assert!(matches!(
        msg.set("/DONATION_ORDER(3)/ORC-1", "XO"),
        Err(Hl7Error::RepetitionOutOfRange { rep: 3, count: 2, .. })
    ));
    assert_eq!(msg.root().repetitions("DONATION_ORDER").unwrap(), 2);
}

#[test]
fn test_failed_set_leaves_message_unchanged() {
    let mut msg = Message::new("DRC_O47", Version::V2_8, provider()).unwrap();
    let before = msg.encode();

    assert!(matches!(
        msg.set("/DONATION_ORDER(0)/OBR-4(3)", "x"),
        Err(Hl7Error::RepetitionOutOfRange { rep: 3, count: 0, .. })
    ));
    assert!(matches!(
        msg.set("/DONATION_ORDER(0)/TIMING(0)/TQ1-999999999", "x"),
        Err(Hl7Error::InvalidFieldNumber { number: 999_999_999, .. })
    ));
    assert!(matches!(msg.set("MSH-2", "x"), Err(Hl7Error::InvalidPath { .. })));
    assert!(matches!(
        msg.set("/DONATION_ORDER(0)/ORC(1)-1", "x"),
        Err(Hl7Error::NotRepeatable { repeating: false, .. })
    ));
    assert!(matches!(msg.set("TQ2-1(1)", "x"), Err(Hl7Error::RepetitionOutOfRange { .. })));

    assert_eq!(msg.root().repetitions("DONATION_ORDER").unwrap(), 0);
    assert_eq!(msg.encode(), before);

    // the same path succeeds once the repetition is in range
    msg.set("/DONATION_ORDER(0)/OBR-4", "BLD").unwrap();
    assert_eq!(msg.root().repetitions("DONATION_ORDER").unwrap(), 1);
    assert!(msg.encode().ends_with("ORC\rOBR||||BLD\r"));
}

#[test]
fn test_edit_then_reparse() {
    let provider = provider();
    let mut msg = parse(DRC_MESSAGE, provider.clone(), Version::V2_8).unwrap();

    let order = msg.root_mut().get_rep("DONATION_ORDER", 1).unwrap().group_mut().unwrap();
    let note = order.add("NTE2").unwrap().segment_mut().unwrap();
    note.get_rep(3, 0).unwrap().set_text("Re-check & label");

    let text = msg.encode();
    assert!(text.ends_with("OBR|1|D101^LAB\rNTE|||Re-check \\T\\ label\r"));

    let again = parse(&text, provider, Version::V2_8).unwrap();
    assert_eq!(
        again.get("/DONATION_ORDER(1)/NTE2-3").unwrap().as_deref(),
        Some("Re-check & label")
    );
}

#[test]
fn test_strict_and_lenient_modes() {
    let text = DRC_MESSAGE.replace("TQ2|1\r", "TQ2|1\rZDN|custom^data\r");

    match parse(&text, provider(), Version::V2_8) {
        Err(Hl7Error::UnexpectedSegment { line, name, .. }) => {
            assert_eq!(line, 6);
            assert_eq!(name, "ZDN");
        }
        other => panic!("expected UnexpectedSegment, got {other:?}"),
    }

    let parser = Parser::with_options(provider(), ParseOptions::lenient());
    let (msg, stats) = parser.parse_with_stats(&text).unwrap();
    assert_eq!(stats.total_segments, 10);
    assert_eq!(stats.unrecognized_segments, 1);
    assert_eq!(msg.unrecognized_segments()[0].segment.name(), "ZDN");
    assert_eq!(msg.encode(), text);
}

#[test]
fn test_batch_parse() {
    let texts = vec![DRC_MESSAGE.to_string(), "garbage".to_string(), DRC_MESSAGE.replace("\r", "\n")];
    let results = parse_batch(&texts, provider(), ParseOptions::default());
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Hl7Error::MalformedHeader { .. })));

    // line-feed separated input parses to the same tree
    let from_lf = results[2].as_ref().unwrap();
    assert_eq!(from_lf.encode(), DRC_MESSAGE);
}

#[test]
fn test_validate_parsed_segment() {
    let text = DRC_MESSAGE.replace("TQ1|1||||||20240201080000", "TQ1|x||||||2024-02-01");
    let msg = parse(&text, provider(), Version::V2_8).unwrap();
    let order = msg.root().child("DONATION_ORDER", 0).unwrap().as_group().unwrap();
    let tq1 = order
        .child("TIMING", 0)
        .and_then(|node| node.as_group())
        .and_then(|group| group.child("TQ1", 0))
        .and_then(|node| node.as_segment())
        .unwrap();

    let issues = tq1.validate();
    let fields: Vec<usize> = issues.iter().map(|issue| issue.field).collect();
    assert_eq!(fields, vec![1, 7]);
}
