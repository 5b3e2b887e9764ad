//! Exercises spec.md §8 scenarios 4 and 5: interleaved multiplexing of two
//! requests on one connection, and a transport EOF mid-stream failing every
//! pending `ResultSet` on that connection without touching any other
//! connection.

mod common;

use std::time::Duration;

use common::{encode_response, Inbound, MockTransport};
use gremlin_client::{Connection, Request, Uuid, Value};

#[tokio::test]
async fn two_requests_interleaved_on_one_connection() {
    let (transport, tx) = MockTransport::new();
    let connection = Connection::from_transport(transport, None, 1000);

    let a_id = Uuid::new_v4();
    let b_id = Uuid::new_v4();

    let rs_a = connection
        .write(Request::eval(a_id, "g.V().count()", None))
        .await
        .expect("submit A");
    let rs_b = connection
        .write(Request::eval(b_id, "g.V().values('name')", None))
        .await
        .expect("submit B");

    assert_eq!(connection.active_results().await, 2);

    // A1, B1, A2, A3, B2-final, A4, A5-final
    for (id, status, item) in [
        (a_id, 206, "A1"),
        (b_id, 206, "B1"),
        (a_id, 206, "A2"),
        (a_id, 206, "A3"),
        (b_id, 200, "B2"),
        (a_id, 206, "A4"),
        (a_id, 200, "A5"),
    ] {
        tx.send(Inbound::Frame(encode_response(
            id,
            status,
            "",
            vec![Value::string(item)],
            Vec::new(),
        )))
        .unwrap();
    }

    let (a_items, b_items) = tokio::join!(rs_a.all(), rs_b.all());

    assert_eq!(
        a_items.expect("A completes ok"),
        vec![
            Value::string("A1"),
            Value::string("A2"),
            Value::string("A3"),
            Value::string("A4"),
            Value::string("A5"),
        ]
    );
    assert_eq!(
        b_items.expect("B completes ok"),
        vec![Value::string("B1"), Value::string("B2")]
    );

    assert_eq!(connection.active_results().await, 0);
}

#[tokio::test]
async fn connection_failure_mid_stream_fails_pending_result_sets() {
    let (transport, tx) = MockTransport::new();
    let connection = Connection::from_transport(transport, None, 1000);

    let a_id = Uuid::new_v4();
    let b_id = Uuid::new_v4();

    let rs_a = connection
        .write(Request::eval(a_id, "g.V()", None))
        .await
        .expect("submit A");
    let rs_b = connection
        .write(Request::eval(b_id, "g.E()", None))
        .await
        .expect("submit B");

    tx.send(Inbound::Frame(encode_response(
        a_id,
        206,
        "",
        vec![Value::string("A1")],
        Vec::new(),
    )))
    .unwrap();
    tx.send(Inbound::Eof).unwrap();

    // Both results terminate in error; A does not silently succeed just
    // because one partial frame made it through before the EOF.
    assert!(rs_a.all().await.is_err());
    assert!(rs_b.all().await.is_err());

    // The reader task's close() call on the mock transport is asynchronous
    // relative to this test observing it; give it a moment to land.
    for _ in 0..50 {
        if connection.is_closed() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(connection.is_closed());
}
