use bytes::Bytes;

use crate::auth::AuthInfo;
use crate::connection::ActiveResults;
use crate::error::{Error, ProtocolError, Result};
use crate::request::Request;
use crate::response::{Response, StatusCode};
use crate::result_set::GremlinResult;
use crate::transport::WebSocketTransport;

/// Serializes `request` into a websocket frame ready for
/// `Transport::write`: `{mime-len}{mime}{version}{requestId}{op}
/// {processor}{args}` (spec.md §4.C's request framing).
pub fn encode_request(request: &Request) -> Result<Bytes> {
    let body = request.encode()?;
    Ok(WebSocketTransport::frame(body.freeze()))
}

/// What the reader loop should do after dispatching one frame.
pub enum Dispatch {
    /// The frame was handled; no reply is needed.
    Done,
    /// The frame was a 407 challenge; reply with the given authentication
    /// request (spec.md §4.C). The original request stays pending.
    Reply(Request),
}

/// Parses and dispatches one response frame against the connection's
/// active-results map, per spec.md §4.C's streaming/status dispatch table.
///
/// A codec error parsing the body (after the header parsed successfully)
/// fails only the owning `ResultSet` and is swallowed here — per spec.md
/// §7, it must not propagate up and close the connection.
#[tracing::instrument(level = "trace", skip_all)]
pub async fn dispatch_frame(
    frame: Bytes,
    results: &ActiveResults,
    auth: Option<&AuthInfo>,
) -> Result<Dispatch> {
    let mut buf = &frame[..];
    let (version, request_id) = Response::decode_header(&mut buf)?;

    let response = match Response::decode_body(version, request_id, buf) {
        Ok(response) => response,
        Err(err) => {
            if let Some(result_set) = results.get(&request_id).await {
                result_set.close_err(err).await;
                results.remove(&request_id).await;
            } else {
                tracing::debug!(%request_id, "decode error for unknown request id, dropping");
            }
            return Ok(Dispatch::Done);
        }
    };

    dispatch_response(response, results, auth).await
}

async fn dispatch_response(
    response: Response,
    results: &ActiveResults,
    auth: Option<&AuthInfo>,
) -> Result<Dispatch> {
    let request_id = response.request_id;

    let Some(result_set) = results.get(&request_id).await else {
        tracing::debug!(%request_id, status = response.status.code.code(), "response for unknown request id, dropping");
        return Ok(Dispatch::Done);
    };

    match response.status.code {
        StatusCode::AuthenticationRequired => {
            tracing::info!(%request_id, "server requested authentication");
            let Some(auth) = auth else {
                let err = Error::Protocol(ProtocolError::AuthenticationNotConfigured);
                result_set.close_err(clone_for_close(&err)).await;
                results.remove(&request_id).await;
                return Err(err);
            };
            Ok(Dispatch::Reply(Request::authentication(request_id, auth)))
        }
        StatusCode::PartialContent => {
            tracing::trace!(%request_id, items = response.result.data.len(), "partial frame");
            let aggregate_to = response.aggregate_to().map(str::to_owned);
            for item in response.result.data {
                result_set
                    .add_result(wrap_result(item, response.result.meta.as_slice()))
                    .await;
            }
            if let Some(aggregate_to) = aggregate_to {
                result_set.set_aggregate_to(aggregate_to).await;
            }
            Ok(Dispatch::Done)
        }
        StatusCode::Success | StatusCode::NoContent => {
            tracing::info!(%request_id, "request finalized");
            for item in response.result.data {
                result_set
                    .add_result(wrap_result(item, response.result.meta.as_slice()))
                    .await;
            }
            let aggregate_to = response.aggregate_to().map(str::to_owned);
            result_set
                .close_ok(response.status.attributes, aggregate_to)
                .await;
            results.remove(&request_id).await;
            Ok(Dispatch::Done)
        }
        StatusCode::ClientOrServerError(code) => {
            tracing::debug!(%request_id, code, message = %response.status.message, "server error");
            let err = Error::server(code, response.status.message);
            result_set.close_err(clone_for_close(&err)).await;
            results.remove(&request_id).await;
            Ok(Dispatch::Done)
        }
        StatusCode::Other(_) => {
            let err = Error::Protocol(ProtocolError::UnknownStatusCode(response.status.code.code()));
            result_set.close_err(clone_for_close(&err)).await;
            results.remove(&request_id).await;
            Err(err)
        }
    }
}

fn wrap_result(value: graphbinary::Value, _meta: &[(graphbinary::Value, graphbinary::Value)]) -> GremlinResult {
    if let graphbinary::Value::Traverser(traverser) = value {
        GremlinResult::with_bulk(*traverser.value, traverser.bulk)
    } else {
        GremlinResult::new(value)
    }
}

fn clone_for_close(err: &Error) -> Error {
    Error::Shared(std::sync::Arc::new(match err {
        Error::Server { code, message } => Error::Server {
            code: *code,
            message: message.clone(),
        },
        Error::Protocol(ProtocolError::AuthenticationNotConfigured) => {
            Error::Protocol(ProtocolError::AuthenticationNotConfigured)
        }
        Error::Protocol(ProtocolError::UnknownStatusCode(c)) => {
            Error::Protocol(ProtocolError::UnknownStatusCode(*c))
        }
        other => Error::server(-1, other.to_string()),
    }))
}
