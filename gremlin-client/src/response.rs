use bytes::Buf;
use graphbinary::{Uuid, Value, ValueMap};

use crate::error::{ProtocolError, Result};

/// Status codes named in spec.md §3. Anything else in the 2xx/4xx/5xx range
/// that isn't one of these is still accepted by [`StatusCode::from_i32`]
/// (`Other`) so an unrecognized-but-well-formed code doesn't fail decode —
/// only dispatch in the protocol engine treats unknown codes as an error
/// (spec.md §7's `ProtocolError::UnknownStatusCode`).
///
/// 401 has no dedicated variant: per spec.md §4.C dispatch rule 4, any
/// 4xx/5xx status other than 407 (the auth challenge) is a terminal server
/// error surfaced verbatim, so 401 falls into [`StatusCode::ClientOrServerError`]
/// alongside the rest of the 4xx/5xx range rather than getting its own path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    NoContent,
    PartialContent,
    AuthenticationRequired,
    ClientOrServerError(i32),
    Other(i32),
}

impl StatusCode {
    pub fn from_i32(code: i32) -> Self {
        match code {
            200 => StatusCode::Success,
            204 => StatusCode::NoContent,
            206 => StatusCode::PartialContent,
            407 => StatusCode::AuthenticationRequired,
            400..=599 => StatusCode::ClientOrServerError(code),
            other => StatusCode::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            StatusCode::Success => 200,
            StatusCode::NoContent => 204,
            StatusCode::PartialContent => 206,
            StatusCode::AuthenticationRequired => 407,
            StatusCode::ClientOrServerError(c) | StatusCode::Other(c) => c,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, StatusCode::ClientOrServerError(_))
    }

    pub fn is_terminal_success(self) -> bool {
        matches!(self, StatusCode::Success | StatusCode::NoContent)
    }
}

#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    pub attributes: ValueMap,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseResult {
    pub data: Vec<Value>,
    pub meta: ValueMap,
}

/// `{version, requestId, status, result}`, per spec.md §3.
#[derive(Debug, Clone)]
pub struct Response {
    pub version: u8,
    pub request_id: Uuid,
    pub status: Status,
    pub result: ResponseResult,
}

impl Response {
    /// Decodes the fixed-position header: `{version}{requestId non-fq}`.
    ///
    /// Split out from [`Self::decode_body`] so the protocol engine can
    /// attribute a body decode failure to the right `ResultSet` — per
    /// spec.md §7, a codec error decoding a frame's body fails only the
    /// owning `ResultSet`, not the connection, but that requires knowing
    /// the request id *before* the part that can fail to parse.
    pub fn decode_header(buf: &mut impl Buf) -> Result<(u8, Uuid)> {
        if buf.remaining() < 1 {
            return Err(ProtocolError::MalformedEnvelope("missing version byte").into());
        }
        let version = buf.get_u8();
        let request_id = graphbinary::read_uuid_nfq(buf)?;
        Ok((version, request_id))
    }

    /// Decodes the status/result body that follows the header. The envelope
    /// is `{status.code non-fq Int32}{status.message non-fq String}
    /// {status.attributes Map FQ}{result.data List FQ}{result.meta Map FQ}`
    /// — the same shape as the request envelope (fixed-position fields
    /// non-fully-qualified, the variable payload fully-qualified), mirrored
    /// for the reply direction.
    pub fn decode_body(version: u8, request_id: Uuid, mut buf: impl Buf) -> Result<Self> {
        let code = match graphbinary::read_value(&mut buf)? {
            Value::Int32(code) => code,
            _ => return Err(ProtocolError::MalformedEnvelope("status.code is not Int32").into()),
        };
        let message = graphbinary::read_string_nfq(&mut buf)?;
        let attributes = match graphbinary::read_value(&mut buf)? {
            Value::Map(entries) => entries,
            Value::Null => Vec::new(),
            _ => {
                return Err(
                    ProtocolError::MalformedEnvelope("status.attributes is not a Map").into(),
                )
            }
        };

        let data = match graphbinary::read_value(&mut buf)? {
            Value::List(items) => items,
            Value::Null => Vec::new(),
            _ => return Err(ProtocolError::MalformedEnvelope("result.data is not a List").into()),
        };
        let meta = match graphbinary::read_value(&mut buf)? {
            Value::Map(entries) => entries,
            Value::Null => Vec::new(),
            _ => return Err(ProtocolError::MalformedEnvelope("result.meta is not a Map").into()),
        };

        Ok(Response {
            version,
            request_id,
            status: Status {
                code: StatusCode::from_i32(code),
                message,
                attributes,
            },
            result: ResponseResult { data, meta },
        })
    }

    /// Decodes a complete frame in one call: header then body. Convenient
    /// for tests and for any caller that doesn't need per-field error
    /// attribution.
    pub fn decode(mut buf: impl Buf) -> Result<Self> {
        let (version, request_id) = Self::decode_header(&mut buf)?;
        Self::decode_body(version, request_id, buf)
    }

    /// The `result.meta.aggregateTo` aggregation hint, if present, per
    /// spec.md §4.C step 2.
    pub fn aggregate_to(&self) -> Option<&str> {
        Value::map_get(&self.result.meta, &Value::string("aggregateTo")).and_then(|v| match v {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
    }
}
