//! GraphBinary: a self-describing, tagged binary format for the polymorphic
//! value universe exchanged with a Gremlin Server (primitives, big
//! integers, UUIDs, strings, lists, maps, bytecode, traversers).
//!
//! This crate is the wire-types layer: it has no networking and no async
//! runtime dependency, the same split the transport/protocol engine crate
//! above it (`gremlin-client`) draws between itself and its wire format.

mod de;
mod error;
mod ser;
mod value;

pub use de::{read_expected, read_string_nfq, read_uuid_nfq, read_value, read_value_non_nullable};
pub use error::{CodecError, Result};
pub use ser::{write_string_nfq, write_uuid_nfq, write_value};
pub use value::{Binding, Bytecode, Instruction, TypeCode, Traverser, Value, ValueMap};
pub use uuid::Uuid;
