//!
//! run it
//!
//! ```
//! $ RUST_LOG=debug cargo run --example hyper
//! ```
//!
//! then upload something and watch the progress record
//! ```
//! $ curl -b ring-session=demo http://127.0.0.1:3000/upload -F tags=x -F tags=y -F file=@Cargo.toml
//! $ curl -b ring-session=demo http://127.0.0.1:3000/progress
//! ```
//!
//! Spilled files land in the system temp directory and stay there; the
//! decoder hands their ownership to this handler.

#![deny(warnings)]

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{BodyStream, Full};
use hyper::{
    body::Incoming, server::conn::http1, service::service_fn, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;

use multipart_params::{
    request, MemoryStore, Params, SessionStore, Uploader, DEFAULT_COOKIE_NAME, PROGRESS_KEY,
};

async fn serve(store: Arc<MemoryStore>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    match req.uri().path() {
        "/progress" => progress(&store, &req),
        _ => upload(store, req).await,
    }
}

async fn upload(store: Arc<MemoryStore>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let uploader = Uploader::new().store(store);

    let (parts, body) = req.into_parts();
    let body = BodyStream::new(body)
        .filter_map(|result| async move { result.map(|frame| frame.into_data().ok()).transpose() })
        .boxed();

    let req = uploader.process(Request::from_parts(parts, body)).await?;

    let mut txt = String::new();
    if let Some(Params(params)) = req.extensions().get::<Params>() {
        for (name, value) in params.iter() {
            txt.push_str(&format!("{name}: {value:?}\r\n"));
        }
    }

    Ok(Response::new(Full::from(txt)))
}

fn progress(store: &MemoryStore, req: &Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let Some(key) = request::cookie_value(req, DEFAULT_COOKIE_NAME) else {
        return status(StatusCode::BAD_REQUEST, "no session cookie");
    };

    let record = store.read(&key).map_err(|e| anyhow::anyhow!(e))?;
    match record.get(PROGRESS_KEY) {
        Some(value) => Ok(Response::new(Full::from(value.to_string()))),
        None => status(StatusCode::NOT_FOUND, "no upload seen for this session"),
    }
}

fn status(code: StatusCode, msg: &'static str) -> Result<Response<Full<Bytes>>> {
    Ok(Response::builder().status(code).body(Full::from(msg))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        // From env var: `RUST_LOG`
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = Arc::new(MemoryStore::new());

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("Listening on http://{addr}");

    loop {
        let (socket, _) = listener.accept().await?;
        let io = TokioIo::new(socket);
        let store = store.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| serve(store.clone(), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                eprintln!("connection error: {e}");
            }
        });
    }
}
