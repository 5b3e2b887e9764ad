use bytes::{BufMut, BytesMut};
use graphbinary::{Bytecode, Uuid, Value, ValueMap};

use crate::auth::AuthInfo;
use crate::error::{Result, UsageError};

/// The protocol version byte carried by every request, per spec.md §4.C.
const REQUEST_VERSION: u8 = 0x81;

/// `{requestId, op, processor, args}`, per spec.md §3.
///
/// Built with plain fields and the constructor functions below rather than a
/// serde-derived DTO — the same choice the teacher makes for its own request
/// types (`broker::AppendRequest` etc. are populated as plain structs, not
/// routed through a serde bridge).
#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: Uuid,
    pub op: String,
    pub processor: String,
    pub args: ValueMap,
}

impl Request {
    fn with_args(request_id: Uuid, op: &str, processor: &str, args: ValueMap) -> Self {
        Self {
            request_id,
            op: op.to_string(),
            processor: processor.to_string(),
            args,
        }
    }

    /// `op="bytecode"`; `processor="session"` when `session` is `Some`,
    /// else `""` — spec.md's resolution of the `processor` Open Question
    /// (§9): bytecode requests outside a session carry an empty processor.
    ///
    /// Fails with [`UsageError::MultipleSessionIds`] when `bytecode` carries
    /// its own `"session"` binding (set directly by a caller building
    /// bytecode by hand) that disagrees with `session` — spec.md §7 names
    /// this usage error but leaves where it's raised unspecified; this is
    /// the one place the two sources of a session id (the explicit
    /// parameter and the bytecode's own bindings map, spec.md §3) could
    /// conflict.
    pub fn bytecode(
        request_id: Uuid,
        bytecode: Bytecode,
        traversal_source: impl Into<String>,
        session: Option<Uuid>,
    ) -> Result<Self> {
        if let (Some(session_id), Some(Value::Uuid(bound_id))) =
            (session, bytecode.bindings.get("session"))
        {
            if *bound_id != session_id {
                return Err(UsageError::MultipleSessionIds.into());
            }
        }

        let mut args: ValueMap = vec![
            (Value::string("gremlin"), Value::Bytecode(bytecode)),
            (
                Value::string("aliases"),
                Value::Map(vec![(
                    Value::string("g"),
                    Value::string(traversal_source.into()),
                )]),
            ),
        ];
        let processor = if let Some(session_id) = session {
            args.push((Value::string("session"), Value::Uuid(session_id)));
            "session"
        } else {
            ""
        };
        Ok(Self::with_args(request_id, "bytecode", processor, args))
    }

    /// `op="eval"`, `args["language"]="gremlin-groovy"`.
    pub fn eval(request_id: Uuid, script: impl Into<String>, session: Option<Uuid>) -> Self {
        let mut args: ValueMap = vec![
            (Value::string("gremlin"), Value::string(script.into())),
            (
                Value::string("language"),
                Value::string("gremlin-groovy"),
            ),
        ];
        let processor = if let Some(session_id) = session {
            args.push((Value::string("session"), Value::Uuid(session_id)));
            "session"
        } else {
            ""
        };
        Self::with_args(request_id, "eval", processor, args)
    }

    /// Reply to a 407 challenge: `op="authentication"`,
    /// `args["saslMechanism"]="PLAIN"`, `args["sasl"]=base64("\0user\0pass")`.
    /// Reuses `request_id` of the original, still-pending request, per
    /// spec.md §4.C: the original request is not closed.
    pub fn authentication(request_id: Uuid, auth: &AuthInfo) -> Self {
        let args: ValueMap = vec![
            (Value::string("saslMechanism"), Value::string("PLAIN")),
            (Value::string("sasl"), Value::string(auth.sasl_plain())),
        ];
        Self::with_args(request_id, "authentication", "", args)
    }

    /// Explicit session teardown, supplementing spec.md §6: lets
    /// `Session::close` release server-side state instead of relying on the
    /// server's idle timeout.
    pub fn close_session(request_id: Uuid, session_id: Uuid) -> Self {
        let args: ValueMap = vec![(Value::string("session"), Value::Uuid(session_id))];
        Self::with_args(request_id, "session-close", "session", args)
    }

    /// Encodes the GraphBinary request body (not the mime-length-prefixed
    /// outer envelope, which is the protocol engine's concern):
    /// `{version}{requestId non-fq}{op non-fq}{processor non-fq}{args Map FQ}`.
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::new();
        buf.put_u8(REQUEST_VERSION);
        graphbinary::write_uuid_nfq(&mut buf, &self.request_id);
        graphbinary::write_string_nfq(&mut buf, &self.op)?;
        graphbinary::write_string_nfq(&mut buf, &self.processor)?;
        graphbinary::write_value(&mut buf, &Value::Map(self.args.clone()))?;
        Ok(buf)
    }
}
