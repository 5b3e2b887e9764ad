use std::collections::BTreeMap;

use num_bigint::BigInt;
use uuid::Uuid;

use crate::error::CodecError;

/// One unsigned byte identifying a concrete GraphBinary type.
///
/// The distinguished `Null` code denotes an absent value and never carries a
/// value body of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Int32,
    Int64,
    String,
    Date,
    Timestamp,
    Class,
    Double,
    Float,
    List,
    Map,
    Set,
    Uuid,
    Byte,
    Boolean,
    Short,
    BigInteger,
    Bytecode,
    Traverser,
    Binding,
    Null,
}

impl TypeCode {
    pub fn code(self) -> u8 {
        match self {
            TypeCode::Int32 => 0x01,
            TypeCode::Int64 => 0x02,
            TypeCode::String => 0x03,
            TypeCode::Date => 0x04,
            TypeCode::Timestamp => 0x05,
            TypeCode::Class => 0x06,
            TypeCode::Double => 0x07,
            TypeCode::Float => 0x08,
            TypeCode::List => 0x09,
            TypeCode::Map => 0x0a,
            TypeCode::Set => 0x0b,
            TypeCode::Uuid => 0x0c,
            TypeCode::Byte => 0x24,
            TypeCode::Boolean => 0x27,
            TypeCode::Short => 0x26,
            TypeCode::BigInteger => 0x23,
            TypeCode::Bytecode => 0x15,
            TypeCode::Traverser => 0x21,
            TypeCode::Binding => 0x14,
            TypeCode::Null => 0xfe,
        }
    }

    pub fn from_u8(code: u8) -> Result<Self, CodecError> {
        Ok(match code {
            0x01 => TypeCode::Int32,
            0x02 => TypeCode::Int64,
            0x03 => TypeCode::String,
            0x04 => TypeCode::Date,
            0x05 => TypeCode::Timestamp,
            0x06 => TypeCode::Class,
            0x07 => TypeCode::Double,
            0x08 => TypeCode::Float,
            0x09 => TypeCode::List,
            0x0a => TypeCode::Map,
            0x0b => TypeCode::Set,
            0x0c => TypeCode::Uuid,
            0x24 => TypeCode::Byte,
            0x27 => TypeCode::Boolean,
            0x26 => TypeCode::Short,
            0x23 => TypeCode::BigInteger,
            0x15 => TypeCode::Bytecode,
            0x21 => TypeCode::Traverser,
            0x14 => TypeCode::Binding,
            0xfe => TypeCode::Null,
            other => return Err(CodecError::UnrecognizedTypeCode(other)),
        })
    }
}

/// An instruction within a [`Bytecode`] program: a step or source operator
/// together with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub operator: String,
    pub arguments: Vec<Value>,
}

impl Instruction {
    pub fn new(operator: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            operator: operator.into(),
            arguments,
        }
    }
}

/// A key bound to a value, used by the traversal builder to name arguments
/// for parameterized bytecode. Bindings are carried as input metadata only;
/// they are not a distinct step in the wire grammar, but a wrapper value a
/// builder substitutes in place of a plain argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub key: String,
    pub value: Box<Value>,
}

/// An ordered pair of instruction sequences sent to the server for
/// execution, plus the bindings map used only as client-side input metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bytecode {
    pub steps: Vec<Instruction>,
    pub sources: Vec<Instruction>,
    pub bindings: BTreeMap<String, Value>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, operator: impl Into<String>, arguments: Vec<Value>) -> &mut Self {
        self.steps.push(Instruction::new(operator, arguments));
        self
    }

    pub fn add_source(&mut self, operator: impl Into<String>, arguments: Vec<Value>) -> &mut Self {
        self.sources.push(Instruction::new(operator, arguments));
        self
    }
}

/// A server-side token representing `bulk` copies of `value` flowing through
/// a traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Traverser {
    pub bulk: i64,
    pub value: Box<Value>,
}

/// A `Value` is an ordered `(key, value)` pair collection that preserves
/// caller insertion order on encode. Decoding applies last-wins on duplicate
/// keys, per the wire grammar.
pub type ValueMap = Vec<(Value, Value)>;

/// The polymorphic GraphBinary value universe.
///
/// `List`/`Set` both round-trip through the same wire shape; `Set`
/// deduplicates on construction (`Value::set`) but is otherwise an ordinary
/// list on the wire, per the upstream GraphBinary type table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int32(i32),
    Int64(i64),
    BigInt(BigInt),
    Float32(f32),
    Float64(f64),
    String(String),
    Uuid(Uuid),
    Date(i64),
    Timestamp(i64),
    Class(String),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(ValueMap),
    Bytecode(Bytecode),
    Binding(Binding),
    Traverser(Traverser),
}

impl Value {
    pub fn set(items: Vec<Value>) -> Self {
        let mut seen: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !seen.contains(&item) {
                seen.push(item);
            }
        }
        Value::Set(seen)
    }

    pub fn map_get<'a>(map: &'a ValueMap, key: &Value) -> Option<&'a Value> {
        map.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Pick the narrowest integer representation that holds `v`, per
    /// spec.md's numeric-type-selection rule: Int32 if it fits, else Int64,
    /// else BigInt.
    pub fn from_integral(v: i128) -> Self {
        if let Ok(v) = i32::try_from(v) {
            Value::Int32(v)
        } else if let Ok(v) = i64::try_from(v) {
            Value::Int64(v)
        } else {
            Value::BigInt(BigInt::from(v))
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}
