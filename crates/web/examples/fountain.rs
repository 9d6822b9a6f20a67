//! First draft: partial use of the stream machinery.
//!
//! A background task keeps a bounded channel topped up with random numbers.
//! The pipeline zips the request stream with the squared numbers, so each
//! caller receives the square of whatever number the fountain produced next.
//! The requests themselves are ignored; the point is sampling a shared
//! stream from independent connections.

use futures::{SinkExt, StreamExt, channel::mpsc};
use http::StatusCode;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

use sluice_bridge::bridge::Bridge;
use sluice_bridge::error::BoxError;
use sluice_bridge::ingress::RequestStream;
use sluice_bridge::pipeline::make_pipeline;
use sluice_web::protocol::{Request, Response};
use sluice_web::server::Server;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let (mut fountain, numbers) = mpsc::channel::<u32>(8);
    tokio::spawn(async move {
        loop {
            if fountain.send(rand::random_range(0..100)).await.is_err() {
                break;
            }
        }
    });

    let pipeline = make_pipeline(move |requests: RequestStream<Request>| {
        requests.zip(numbers.map(|n| n * n)).map(|(envelope, square)| -> Result<_, BoxError> {
            let response = Response::text(StatusCode::OK, format!("{square}\n"));
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
