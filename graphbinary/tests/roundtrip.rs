use bytes::BytesMut;
use graphbinary::{read_value, write_value, Bytecode, Uuid, Value};
use pretty_assertions::assert_eq;

fn roundtrip(value: Value) -> Value {
    let mut buf = BytesMut::new();
    write_value(&mut buf, &value).expect("encode");
    let mut slice = &buf[..];
    read_value(&mut slice).expect("decode")
}

#[test]
fn modern_graph_bytecode_roundtrips() {
    let mut bytecode = Bytecode::new();
    bytecode.add_step("V", vec![]);
    bytecode.add_step("has", vec![Value::string("name"), Value::string("marko")]);
    bytecode.add_step("out", vec![Value::string("knows")]);
    bytecode.add_step("values", vec![Value::string("name")]);
    bytecode.add_source("withStrategies", vec![Value::string("ReadOnlyStrategy")]);

    let decoded = roundtrip(Value::Bytecode(bytecode.clone()));
    match decoded {
        Value::Bytecode(decoded) => {
            assert_eq!(decoded.steps.len(), bytecode.steps.len());
            assert_eq!(decoded.sources.len(), bytecode.sources.len());
            for (expected, actual) in bytecode.steps.iter().zip(decoded.steps.iter()) {
                assert_eq!(expected.operator, actual.operator);
                assert_eq!(expected.arguments, actual.arguments);
            }
            for (expected, actual) in bytecode.sources.iter().zip(decoded.sources.iter()) {
                assert_eq!(expected.operator, actual.operator);
                assert_eq!(expected.arguments, actual.arguments);
            }
        }
        other => panic!("expected Bytecode, got {other:?}"),
    }
}

#[test]
fn map_with_null_value_preserves_null() {
    let map = Value::Map(vec![
        (
            Value::string("a"),
            Value::List(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]),
        ),
        (Value::string("b"), Value::Null),
    ]);

    let decoded = roundtrip(map);
    match decoded {
        Value::Map(entries) => {
            let b = entries
                .iter()
                .find(|(k, _)| *k == Value::string("b"))
                .map(|(_, v)| v.clone())
                .unwrap();
            assert_eq!(b, Value::Null);
            assert_ne!(b, Value::Int32(0));
        }
        other => panic!("expected Map, got {other:?}"),
    }
}

#[test]
fn duplicate_map_keys_last_wins() {
    let mut buf = BytesMut::new();
    // Hand-encode a map with a duplicated key "x": first 1, then 2.
    buf.extend_from_slice(&[0x0a, 0x00]); // Map, not-null
    buf.extend_from_slice(&2i32.to_be_bytes()); // 2 entries
    write_value(&mut buf, &Value::string("x")).unwrap();
    write_value(&mut buf, &Value::Int32(1)).unwrap();
    write_value(&mut buf, &Value::string("x")).unwrap();
    write_value(&mut buf, &Value::Int32(2)).unwrap();

    let mut slice = &buf[..];
    let decoded = read_value(&mut slice).unwrap();
    match decoded {
        Value::Map(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].1, Value::Int32(2));
        }
        other => panic!("expected Map, got {other:?}"),
    }
}

#[test]
fn uuid_roundtrips() {
    let uuid = Uuid::new_v4();
    let decoded = roundtrip(Value::Uuid(uuid));
    assert_eq!(decoded, Value::Uuid(uuid));
}

#[test]
fn set_deduplicates_on_construction() {
    let set = Value::set(vec![Value::Int32(1), Value::Int32(1), Value::Int32(2)]);
    match &set {
        Value::Set(items) => assert_eq!(items.len(), 2),
        other => panic!("expected Set, got {other:?}"),
    }
    let decoded = roundtrip(set.clone());
    assert_eq!(decoded, set);
}
