//! Second draft: one response per request, computed by a plain map.
//!
//! Displays the request's metadata in the response body.

use std::fmt::Write;

use futures::StreamExt;
use http::StatusCode;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

use sluice_bridge::bridge::Bridge;
use sluice_bridge::error::BoxError;
use sluice_bridge::ingress::RequestStream;
use sluice_bridge::pipeline::make_pipeline;
use sluice_web::protocol::{Request, Response};
use sluice_web::server::Server;

fn describe(request: &Request) -> Response {
    let mut body = String::new();
    let _ = writeln!(body, "method {}", request.method());
    let _ = writeln!(body, "path {}", request.path());
    let _ = writeln!(body, "query {:?}", request.query());
    let _ = writeln!(body, "version {:?}", request.version());
    let _ = writeln!(body, "peer {}", request.peer());
    for (name, value) in request.headers() {
        let _ = writeln!(body, "header {name} {value:?}");
    }
    let _ = writeln!(body, "body {} bytes", request.body().len());

    Response::text(StatusCode::OK, body)
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let pipeline = make_pipeline(|requests: RequestStream<Request>| {
        requests.map(|envelope| -> Result<_, BoxError> {
            let response = describe(envelope.request());
            Ok((envelope, response))
        })
    });

    let bridge = match Bridge::new(pipeline) {
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
