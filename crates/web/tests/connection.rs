use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sluice_bridge::bridge::{Bridge, BridgeBuilder};
use sluice_bridge::error::BoxError;
use sluice_bridge::ingress::RequestStream;
use sluice_bridge::pipeline::make_pipeline;
use sluice_bridge::token::Envelope;
use sluice_web::HttpBridge;
use sluice_web::connection::Connection;
use sluice_web::protocol::{ConnectionError, Request, Response};

/// Serves exactly one loopback connection through the given bridge and
/// returns the serve outcome plus the raw bytes the client read.
async fn roundtrip(bridge: &HttpBridge, raw_request: &[u8]) -> (Result<(), ConnectionError>, Vec<u8>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let address = listener.local_addr().expect("bound address");

    let mut client = TcpStream::connect(address).await.expect("connect loopback");
    let (server_stream, peer) = listener.accept().await.expect("accept loopback");

    client.write_all(raw_request).await.expect("send request");

    let served = Connection::new(server_stream, peer).serve(bridge);
    let mut raw_response = Vec::new();
    let (served, read) = tokio::join!(served, client.read_to_end(&mut raw_response));
    read.expect("read response");

    (served, raw_response)
}

fn dump_pipeline() -> HttpBridge {
    let pipeline = make_pipeline(|requests: RequestStream<Request>| {
        requests.map(|envelope| -> Result<_, BoxError> {
            let request: &Request = envelope.request();
            let body = format!("{} {} body={}\n", request.method(), request.path(), request.body().len());
            Ok((envelope, Response::text(StatusCode::OK, body)))
        })
    });
    Bridge::new(pipeline).expect("build bridge")
}

#[tokio::test]
async fn serves_a_buffered_response_over_the_wire() {
    let bridge = dump_pipeline();

    let (served, raw) = roundtrip(&bridge, b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello").await;
    served.expect("serving succeeds");
    let text = String::from_utf8(raw).expect("ascii response");

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("content-type: text/plain; charset=utf-8\r\n"));
    assert!(text.contains("connection: close\r\n"));
    assert!(text.ends_with("POST /submit body=5\n"));
}

#[tokio::test]
async fn serves_a_streamed_body_with_chunked_framing() {
    let pipeline = make_pipeline(|requests: RequestStream<Request>| {
        requests.map(|envelope| -> Result<_, BoxError> {
            let chunks = futures::stream::iter(["alpha", "beta"])
                .map(|part| Ok::<_, BoxError>(Bytes::from_static(part.as_bytes())))
                .boxed();
            Ok((envelope, Response::streamed(StatusCode::OK, chunks)))
        })
    });
    let bridge = Bridge::new(pipeline).expect("build bridge");

    let (served, raw) = roundtrip(&bridge, b"GET /ticks HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    served.expect("serving succeeds");
    let text = String::from_utf8(raw).expect("ascii response");

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("transfer-encoding: chunked\r\n"));
    assert!(text.contains("5\r\nalpha\r\n"));
    assert!(text.contains("4\r\nbeta\r\n"));
    assert!(text.ends_with("0\r\n\r\n"));
}

#[tokio::test]
async fn a_timed_out_call_turns_into_gateway_timeout() {
    // never responds
    let pipeline = make_pipeline(|requests: RequestStream<Request>| {
        requests.filter_map(|_| async { None::<Result<(Envelope<Request>, Response), BoxError>> })
    });
    let bridge = BridgeBuilder::new().timeout(Duration::from_millis(50)).build(pipeline).expect("build bridge");

    let (served, raw) = roundtrip(&bridge, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    served.expect("serving succeeds");
    let text = String::from_utf8(raw).expect("ascii response");

    assert!(text.starts_with("HTTP/1.1 504 Gateway Timeout\r\n"));
}

#[tokio::test]
async fn an_oversized_content_length_is_rejected_with_bad_request() {
    let bridge = dump_pipeline();

    // u64::MAX, small enough to parse as a usize but far over the body cap
    let raw_request = b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 18446744073709551615\r\n\r\n";
    let (served, raw) = roundtrip(&bridge, raw_request).await;
    let text = String::from_utf8(raw).expect("ascii response");

    assert!(served.is_err());
    assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(text.contains("body size too large"));
    assert_eq!(bridge.pending_calls(), 0);
}
