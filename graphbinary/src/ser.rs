use bytes::{BufMut, BytesMut};
use num_bigint::{BigInt, Sign};
use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::value::{Bytecode, Instruction, TypeCode, Value};

const VALUE_FLAG_NONE: u8 = 0x00;
const VALUE_FLAG_NULL: u8 = 0x01;

/// Writes `value` as a fully-qualified GraphBinary value: type code, value
/// flag, then (unless null) the value body.
///
/// `decode(encode(v)) == v` is the round-trip law this function and
/// [`crate::de::read_value`] jointly maintain (spec.md §3's codec
/// invariant).
pub fn write_value(buf: &mut BytesMut, value: &Value) -> Result<()> {
    if let Value::Null = value {
        buf.put_u8(TypeCode::Null.code());
        buf.put_u8(VALUE_FLAG_NULL);
        return Ok(());
    }

    buf.put_u8(type_code_of(value).code());
    buf.put_u8(VALUE_FLAG_NONE);
    write_body(buf, value)
}

fn type_code_of(value: &Value) -> TypeCode {
    match value {
        Value::Null => TypeCode::Null,
        Value::Bool(_) => TypeCode::Boolean,
        Value::Byte(_) => TypeCode::Byte,
        Value::Short(_) => TypeCode::Short,
        Value::Int32(_) => TypeCode::Int32,
        Value::Int64(_) => TypeCode::Int64,
        Value::BigInt(_) => TypeCode::BigInteger,
        Value::Float32(_) => TypeCode::Float,
        Value::Float64(_) => TypeCode::Double,
        Value::String(_) => TypeCode::String,
        Value::Uuid(_) => TypeCode::Uuid,
        Value::Date(_) => TypeCode::Date,
        Value::Timestamp(_) => TypeCode::Timestamp,
        Value::Class(_) => TypeCode::Class,
        Value::List(_) => TypeCode::List,
        Value::Set(_) => TypeCode::Set,
        Value::Map(_) => TypeCode::Map,
        Value::Bytecode(_) => TypeCode::Bytecode,
        Value::Binding(_) => TypeCode::Binding,
        Value::Traverser(_) => TypeCode::Traverser,
    }
}

fn write_body(buf: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Null => Err(CodecError::UnexpectedNull),
        Value::Bool(b) => {
            buf.put_u8(if *b { 0x01 } else { 0x00 });
            Ok(())
        }
        Value::Byte(b) => {
            buf.put_i8(*b);
            Ok(())
        }
        Value::Short(s) => {
            buf.put_i16(*s);
            Ok(())
        }
        Value::Int32(i) => {
            buf.put_i32(*i);
            Ok(())
        }
        Value::Int64(i) => {
            buf.put_i64(*i);
            Ok(())
        }
        Value::BigInt(b) => write_bigint_body(buf, b),
        Value::Float32(f) => {
            buf.put_f32(*f);
            Ok(())
        }
        Value::Float64(f) => {
            buf.put_f64(*f);
            Ok(())
        }
        Value::String(s) => write_string_body(buf, s),
        Value::Class(s) => write_string_body(buf, s),
        Value::Uuid(u) => {
            buf.put_slice(u.as_bytes());
            Ok(())
        }
        Value::Date(millis) | Value::Timestamp(millis) => {
            buf.put_i64(*millis);
            Ok(())
        }
        Value::List(items) => write_list_body(buf, items),
        Value::Set(items) => write_list_body(buf, items),
        Value::Map(entries) => {
            write_len(buf, entries.len())?;
            for (k, v) in entries {
                write_value(buf, k)?;
                write_value(buf, v)?;
            }
            Ok(())
        }
        Value::Bytecode(bc) => write_bytecode_body(buf, bc),
        Value::Binding(binding) => {
            write_string_body(buf, &binding.key)?;
            write_value(buf, &binding.value)
        }
        Value::Traverser(t) => {
            buf.put_i64(t.bulk);
            write_value(buf, &t.value)
        }
    }
}

fn write_len(buf: &mut BytesMut, len: usize) -> Result<()> {
    let len = i32::try_from(len).map_err(|_| CodecError::SerializeRange(len as i128))?;
    buf.put_i32(len);
    Ok(())
}

fn write_string_body(buf: &mut BytesMut, s: &str) -> Result<()> {
    write_len(buf, s.len())?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn write_list_body(buf: &mut BytesMut, items: &[Value]) -> Result<()> {
    write_len(buf, items.len())?;
    for item in items {
        write_value(buf, item)?;
    }
    Ok(())
}

fn write_bigint_body(buf: &mut BytesMut, value: &BigInt) -> Result<()> {
    if value.sign() == Sign::NoSign {
        buf.put_i32(0);
        return Ok(());
    }
    let bytes = value.to_signed_bytes_be();
    write_len(buf, bytes.len())?;
    buf.put_slice(&bytes);
    Ok(())
}

fn write_instruction(buf: &mut BytesMut, instruction: &Instruction) -> Result<()> {
    write_string_body(buf, &instruction.operator)?;
    write_len(buf, instruction.arguments.len())?;
    for arg in &instruction.arguments {
        write_value(buf, arg)?;
    }
    Ok(())
}

fn write_bytecode_body(buf: &mut BytesMut, bytecode: &Bytecode) -> Result<()> {
    write_len(buf, bytecode.steps.len())?;
    for step in &bytecode.steps {
        write_instruction(buf, step)?;
    }
    write_len(buf, bytecode.sources.len())?;
    for source in &bytecode.sources {
        write_instruction(buf, source)?;
    }
    Ok(())
}

/// Writes a non-fully-qualified string: length-prefixed UTF-8, no type code
/// or value flag. Used for envelope fields whose type is fixed by position
/// (`requestId`, `op`, `processor`).
pub fn write_string_nfq(buf: &mut BytesMut, s: &str) -> Result<()> {
    write_string_body(buf, s)
}

/// Writes a non-fully-qualified UUID: 16 raw bytes, no header.
pub fn write_uuid_nfq(buf: &mut BytesMut, uuid: &Uuid) {
    buf.put_slice(uuid.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn int32_edge_zero() {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &Value::Int32(0)).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn int32_max() {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &Value::Int32(i32::MAX)).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x00, 0x7f, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn int32_min() {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &Value::Int32(i32::MIN)).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x00, 0x80, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn null_is_two_bytes() {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &Value::Null).unwrap();
        assert_eq!(&buf[..], &[0xfe, 0x01]);
    }

    #[test]
    fn bigint_zero_has_zero_length() {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &Value::BigInt(BigInt::from(0))).unwrap();
        assert_eq!(&buf[..], &[0x23, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }
}
