use std::collections::BTreeMap;

use bytes::Buf;
use num_bigint::BigInt;
use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::value::{Binding, Bytecode, Instruction, TypeCode, Traverser, Value};

/// Bounds-checks a fixed-width read (an `Int32`, a `Uuid`'s 16 bytes, and so
/// on). Reconciled as `BufferEmpty` rather than `UnexpectedValueLength`:
/// `UnexpectedValueLength` (see [`read_len`]) means a *declared* length
/// didn't fit the remaining buffer — it only applies to variable-length
/// fields that carry an explicit length prefix to compare against. A
/// fixed-width field has no declared length at all, so running out of bytes
/// partway through one is the same "zero/insufficient bytes remain when more
/// are required" case as any other truncated read, and `BufferEmpty` is the
/// correct variant for it.
fn require(buf: &impl Buf, n: usize) -> Result<()> {
    if buf.remaining() < n {
        Err(CodecError::BufferEmpty)
    } else {
        Ok(())
    }
}

fn read_type_code(buf: &mut impl Buf) -> Result<u8> {
    if buf.remaining() == 0 {
        return Err(CodecError::BufferMissing);
    }
    Ok(buf.get_u8())
}

fn read_flag(buf: &mut impl Buf) -> Result<u8> {
    if buf.remaining() == 0 {
        return Err(CodecError::ValueFlagMissing);
    }
    let flag = buf.get_u8();
    if flag & !0x01 != 0 {
        return Err(CodecError::UnexpectedValueFlag(flag));
    }
    Ok(flag)
}

fn read_len(buf: &mut impl Buf) -> Result<usize> {
    require(buf, 4)?;
    let len = buf.get_i32();
    if len < 0 {
        return Err(CodecError::UnexpectedValueLength {
            length: len as i64,
            reason: "negative length",
        });
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(CodecError::UnexpectedValueLength {
            length: len as i64,
            reason: "declared length exceeds remaining bytes",
        });
    }
    Ok(len)
}

/// Reads a fully-qualified GraphBinary value, in a nullable context: a null
/// flag decodes to [`Value::Null`] regardless of the underlying type.
///
/// This is the entry point used for list items, map entries, bytecode
/// arguments and traverser payloads — anywhere the wire grammar embeds an
/// arbitrary fully-qualified value.
pub fn read_value(buf: &mut impl Buf) -> Result<Value> {
    read_value_ctx(buf, true)
}

/// Reads a fully-qualified GraphBinary value in a non-nullable numeric
/// context: a null flag on a numeric type decodes to that type's zero,
/// rather than [`Value::Null`]. Composite types (String, List, Map,
/// Bytecode, UUID) still decode null to [`Value::Null`] regardless, per
/// spec.md §4.A's null-handling rule.
pub fn read_value_non_nullable(buf: &mut impl Buf) -> Result<Value> {
    read_value_ctx(buf, false)
}

fn read_value_ctx(buf: &mut impl Buf, nullable: bool) -> Result<Value> {
    let code = read_type_code(buf)?;
    let type_code = TypeCode::from_u8(code)?;
    let flag = read_flag(buf)?;

    if flag & 0x01 != 0 {
        return Ok(null_sentinel(type_code, nullable));
    }

    read_body(buf, type_code)
}

/// Reads a fully-qualified value whose type code must match `expected`;
/// used where the protocol engine knows the field's type ahead of time
/// (e.g. a response's `status.code`) and wants a descriptive mismatch error
/// rather than silently accepting any registered type.
pub fn read_expected(buf: &mut impl Buf, expected: TypeCode) -> Result<Value> {
    let code = read_type_code(buf)?;
    if code != expected.code() {
        return Err(CodecError::UnexpectedTypeCode {
            expected: expected.code(),
            found: code,
        });
    }
    let flag = read_flag(buf)?;
    if flag & 0x01 != 0 {
        return Ok(null_sentinel(expected, true));
    }
    read_body(buf, expected)
}

fn null_sentinel(type_code: TypeCode, nullable: bool) -> Value {
    if nullable {
        return Value::Null;
    }
    match type_code {
        TypeCode::Byte => Value::Byte(0),
        TypeCode::Short => Value::Short(0),
        TypeCode::Int32 => Value::Int32(0),
        TypeCode::Int64 => Value::Int64(0),
        TypeCode::BigInteger => Value::BigInt(BigInt::from(0)),
        TypeCode::Float => Value::Float32(0.0),
        TypeCode::Double => Value::Float64(0.0),
        TypeCode::Boolean => Value::Bool(false),
        TypeCode::Date => Value::Date(0),
        TypeCode::Timestamp => Value::Timestamp(0),
        _ => Value::Null,
    }
}

fn read_body(buf: &mut impl Buf, type_code: TypeCode) -> Result<Value> {
    Ok(match type_code {
        TypeCode::Null => Value::Null,
        TypeCode::Boolean => {
            require(buf, 1)?;
            Value::Bool(buf.get_u8() != 0)
        }
        TypeCode::Byte => {
            require(buf, 1)?;
            Value::Byte(buf.get_i8())
        }
        TypeCode::Short => {
            require(buf, 2)?;
            Value::Short(buf.get_i16())
        }
        TypeCode::Int32 => {
            require(buf, 4)?;
            Value::Int32(buf.get_i32())
        }
        TypeCode::Int64 => {
            require(buf, 8)?;
            Value::Int64(buf.get_i64())
        }
        TypeCode::BigInteger => Value::BigInt(read_bigint_body(buf)?),
        TypeCode::Float => {
            require(buf, 4)?;
            Value::Float32(buf.get_f32())
        }
        TypeCode::Double => {
            require(buf, 8)?;
            Value::Float64(buf.get_f64())
        }
        TypeCode::String => Value::String(read_string_body(buf)?),
        TypeCode::Class => Value::Class(read_string_body(buf)?),
        TypeCode::Uuid => {
            require(buf, 16)?;
            let mut bytes = [0u8; 16];
            buf.copy_to_slice(&mut bytes);
            Value::Uuid(Uuid::from_bytes(bytes))
        }
        TypeCode::Date => {
            require(buf, 8)?;
            Value::Date(buf.get_i64())
        }
        TypeCode::Timestamp => {
            require(buf, 8)?;
            Value::Timestamp(buf.get_i64())
        }
        TypeCode::List => Value::List(read_list_body(buf)?),
        TypeCode::Set => Value::Set(read_list_body(buf)?),
        TypeCode::Map => {
            let len = read_len(buf)?;
            // last-wins on duplicate keys, per the wire grammar.
            let mut entries: Vec<(Value, Value)> = Vec::with_capacity(len);
            for _ in 0..len {
                let key = read_value(buf)?;
                let value = read_value(buf)?;
                if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            Value::Map(entries)
        }
        TypeCode::Bytecode => Value::Bytecode(read_bytecode_body(buf)?),
        TypeCode::Binding => {
            let key = read_string_body(buf)?;
            let value = Box::new(read_value(buf)?);
            Value::Binding(Binding { key, value })
        }
        TypeCode::Traverser => {
            require(buf, 8)?;
            let bulk = buf.get_i64();
            let value = Box::new(read_value(buf)?);
            Value::Traverser(Traverser { bulk, value })
        }
    })
}

fn read_string_body(buf: &mut impl Buf) -> Result<String> {
    let len = read_len(buf)?;
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(String::from_utf8(bytes).map_err(|e| CodecError::InvalidUtf8(e.utf8_error()))?)
}

fn read_list_body(buf: &mut impl Buf) -> Result<Vec<Value>> {
    let len = read_len(buf)?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(read_value(buf)?);
    }
    Ok(items)
}

fn read_bigint_body(buf: &mut impl Buf) -> Result<BigInt> {
    let len = read_len(buf)?;
    if len == 0 {
        return Ok(BigInt::from(0));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(BigInt::from_signed_bytes_be(&bytes))
}

fn read_instruction(buf: &mut impl Buf) -> Result<Instruction> {
    let operator = read_string_body(buf)?;
    let len = read_len(buf)?;
    let mut arguments = Vec::with_capacity(len);
    for _ in 0..len {
        arguments.push(read_value(buf)?);
    }
    Ok(Instruction { operator, arguments })
}

fn read_bytecode_body(buf: &mut impl Buf) -> Result<Bytecode> {
    let step_count = read_len(buf)?;
    let mut steps = Vec::with_capacity(step_count);
    for _ in 0..step_count {
        steps.push(read_instruction(buf)?);
    }
    let source_count = read_len(buf)?;
    let mut sources = Vec::with_capacity(source_count);
    for _ in 0..source_count {
        sources.push(read_instruction(buf)?);
    }
    Ok(Bytecode {
        steps,
        sources,
        bindings: BTreeMap::new(),
    })
}

/// Reads a non-fully-qualified string: length-prefixed UTF-8, no type
/// header. Used for envelope fields whose type is fixed by position.
pub fn read_string_nfq(buf: &mut impl Buf) -> Result<String> {
    read_string_body(buf)
}

/// Reads a non-fully-qualified UUID: 16 raw bytes, no header.
pub fn read_uuid_nfq(buf: &mut impl Buf) -> Result<Uuid> {
    require(buf, 16)?;
    let mut bytes = [0u8; 16];
    buf.copy_to_slice(&mut bytes);
    Ok(Uuid::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::write_value;
    use bytes::BytesMut;
    use pretty_assertions::assert_eq;

    #[test]
    fn int32_zero_roundtrip() {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &Value::Int32(0)).unwrap();
        let mut slice = &buf[..];
        assert_eq!(read_value(&mut slice).unwrap(), Value::Int32(0));
    }

    #[test]
    fn null_int32_nullable_context() {
        let bytes = [0x01u8, 0x01];
        let mut slice = &bytes[..];
        assert_eq!(read_value(&mut slice).unwrap(), Value::Null);
    }

    #[test]
    fn null_int32_non_nullable_context() {
        let bytes = [0x01u8, 0x01];
        let mut slice = &bytes[..];
        assert_eq!(
            read_value_non_nullable(&mut slice).unwrap(),
            Value::Int32(0)
        );
    }

    // An Int32 needs 4 bytes after its type/flag pair; only one is
    // available. `BufferEmpty`, not `UnexpectedValueLength` — see the
    // reconciliation note on `require`.
    #[test]
    fn malformed_missing_bytes() {
        let bytes = [0x01u8, 0x00];
        let mut slice = &bytes[..];
        let err = read_value(&mut slice).unwrap_err();
        assert!(matches!(err, CodecError::BufferEmpty));
    }

    #[test]
    fn malformed_value_flag() {
        let bytes = [0x01u8, 0x10];
        let mut slice = &bytes[..];
        let err = read_value(&mut slice).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedValueFlag(0x10)));
    }

    #[test]
    fn unrecognized_type_code() {
        let bytes = [0x99u8, 0x00];
        let mut slice = &bytes[..];
        let err = read_value(&mut slice).unwrap_err();
        assert!(matches!(err, CodecError::UnrecognizedTypeCode(0x99)));
    }
}
