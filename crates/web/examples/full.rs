//! Third draft: the full bridge, exercised properly.
//!
//! Requests are routed by path, handled concurrently (a slow `/ticks`
//! response never delays `/echo` callers), and one route streams its body
//! lazily while it is being written to the socket. A per-call timeout keeps
//! callers from waiting forever on a stalled pipeline.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

use sluice_bridge::bridge::BridgeBuilder;
use sluice_bridge::error::BoxError;
use sluice_bridge::ingress::RequestStream;
use sluice_bridge::pipeline::make_pipeline;
use sluice_web::protocol::{Request, Response};
use sluice_web::server::Server;

fn ticks() -> Response {
    let chunks = futures::stream::iter(0..5u8)
        .then(|i| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, BoxError>(Bytes::from(format!("tick {i}\n")))
        })
        .boxed();
    Response::streamed(StatusCode::OK, chunks)
}

fn echo(request: &Request) -> Response {
    match std::str::from_utf8(request.body()) {
        Ok(body) => Response::text(StatusCode::OK, body),
        Err(_) => Response::text(StatusCode::BAD_REQUEST, "body is not utf-8\n"),
    }
}

async fn route(request: &Request) -> Response {
    match request.path() {
        "/" => Response::text(StatusCode::OK, "try /echo or /ticks\n"),
        "/echo" => echo(request),
        "/ticks" => ticks(),
        _ => Response::text(StatusCode::NOT_FOUND, "nothing here\n"),
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let pipeline = make_pipeline(|requests: RequestStream<Request>| {
        requests
            .map(|envelope| async move {
                let response = route(envelope.request()).await;
                Ok::<_, BoxError>((envelope, response))
            })
            .buffer_unordered(64)
    });

    let bridge = match BridgeBuilder::new().timeout(Duration::from_secs(30)).build(pipeline) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(cause = %e, "building bridge failed");
            return;
        }
    };

    let server = Server::builder()
        .address("127.0.0.1:8000")
        .expect("resolvable address")
        .build()
        .expect("address was set");
    server.serve(bridge).await;
}
