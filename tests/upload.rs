use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::Result;
use bytes::{Bytes, BytesMut};
use encoding_rs::WINDOWS_1252;
use futures_util::stream::{self, TryStreamExt};
use http::Request;

use multipart_params::*;

const FIELDS_AND_FILE: &[u8] = b"--AaB03x\r\ncontent-disposition: form-data; name=\"a\"\r\n\r\n1\r\n--AaB03x\r\ncontent-disposition: form-data; name=\"b\"\r\n\r\n2\r\n--AaB03x\r\ncontent-disposition: form-data; name=\"f\"; filename=\"hello.txt\"\r\ncontent-type: text/plain\r\n\r\nhello\r\n--AaB03x--";

const ONE_FIELD: &[u8] =
    b"--AaB03x\r\ncontent-disposition: form-data; name=\"solo\"\r\n\r\nvalue\r\n--AaB03x--";

const LATIN_FIELD: &[u8] =
    b"--AaB03x\r\ncontent-disposition: form-data; name=\"latin\"\r\n\r\n\xE9\r\n--AaB03x--";

const TRUNCATED: &[u8] =
    b"--AaB03x\r\ncontent-disposition: form-data; name=\"a\"\r\n\r\npartial content";

type TestBody = stream::Iter<std::vec::IntoIter<Result<Bytes, io::Error>>>;

fn body_stream(body: &'static [u8]) -> TestBody {
    stream::iter(
        body.chunks(7)
            .map(|chunk| Ok::<_, io::Error>(Bytes::from_static(chunk)))
            .collect::<Vec<_>>(),
    )
}

fn request_with(content_type: &str, cookie: Option<&str>, body: &'static [u8]) -> Request<TestBody> {
    let mut builder = Request::post("/upload")
        .header("content-type", content_type)
        .header("content-length", body.len());
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(body_stream(body)).unwrap()
}

fn multipart_request(body: &'static [u8], cookie: Option<&str>) -> Request<TestBody> {
    request_with("multipart/form-data; boundary=AaB03x", cookie, body)
}

fn progress_of(store: &MemoryStore, key: &str) -> Option<UploadProgress> {
    store
        .read(key)
        .unwrap()
        .get(PROGRESS_KEY)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

#[derive(Debug, Default)]
struct RecordingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl SessionStore for RecordingStore {
    fn read(&self, key: &str) -> Result<SessionRecord, BoxError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, record: SessionRecord) -> Result<String, BoxError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, record)
    }
}

#[derive(Debug)]
struct FailingStore;

impl SessionStore for FailingStore {
    fn read(&self, _: &str) -> Result<SessionRecord, BoxError> {
        Err("session backend offline".into())
    }

    fn write(&self, _: &str, _: SessionRecord) -> Result<String, BoxError> {
        Err("session backend offline".into())
    }
}

#[tokio::test]
async fn populates_extensions_and_reports_progress() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let uploader = Uploader::new().store(store.clone()).storage(Storage::Memory);

    let req = multipart_request(FIELDS_AND_FILE, Some("ring-session=sess-1"));
    let req = uploader.process(req).await?;

    assert!(req.body().is_drained());

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert_eq!(multipart.get("a"), Some(&ParamValue::Text("1".to_owned())));
    assert_eq!(multipart.get("b"), Some(&ParamValue::Text("2".to_owned())));
    let file = multipart.get("f").and_then(ParamValue::as_file).unwrap();
    assert_eq!(file.filename, "hello.txt");
    assert_eq!(file.size, 5);
    assert_eq!(&file.data.contents()?[..], b"hello");

    let Params(params) = req.extensions().get::<Params>().unwrap();
    assert_eq!(params.len(), 3);

    let progress = progress_of(&store, "sess-1").unwrap();
    assert_eq!(progress.bytes_read, FIELDS_AND_FILE.len() as u64);
    assert_eq!(progress.content_length, Some(FIELDS_AND_FILE.len() as u64));
    assert_eq!(progress.item_count, 3);

    Ok(())
}

#[tokio::test]
async fn non_multipart_passes_through() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let uploader = Uploader::new().store(store.clone()).storage(Storage::Memory);

    let req = request_with(
        "application/json",
        Some("ring-session=sess-1"),
        b"{\"not\": \"multipart\"}",
    );
    let req = uploader.process(req).await?;

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert!(multipart.is_empty());
    let Params(params) = req.extensions().get::<Params>().unwrap();
    assert!(params.is_empty());

    let mut body = req.into_body();
    assert!(!body.is_drained());
    let mut all = BytesMut::new();
    while let Some(buf) = body.try_next().await? {
        all.extend_from_slice(&buf);
    }
    assert_eq!(all, "{\"not\": \"multipart\"}");

    assert_eq!(store.writes.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn multipart_values_override_existing_params() -> Result<()> {
    let uploader = Uploader::new().storage(Storage::Memory);

    let mut req = multipart_request(FIELDS_AND_FILE, None);
    let mut seeded = ParamMap::new();
    seeded.insert("a", ParamValue::Text("from-query".to_owned()));
    seeded.insert("keep", ParamValue::Text("qs".to_owned()));
    req.extensions_mut().insert(Params(seeded));

    let req = uploader.process(req).await?;

    let Params(params) = req.extensions().get::<Params>().unwrap();
    assert_eq!(params.get("a"), Some(&ParamValue::Text("1".to_owned())));
    assert_eq!(params.get("keep"), Some(&ParamValue::Text("qs".to_owned())));
    assert_eq!(params.len(), 4);

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert!(multipart.get("keep").is_none());
    assert_eq!(multipart.len(), 3);

    Ok(())
}

#[tokio::test]
async fn configured_encoding_wins() -> Result<()> {
    let uploader = Uploader::new()
        .storage(Storage::Memory)
        .encoding(WINDOWS_1252);

    let req = request_with(
        "multipart/form-data; boundary=AaB03x; charset=utf-8",
        None,
        LATIN_FIELD,
    );
    let req = uploader.process(req).await?;

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert_eq!(
        multipart.get("latin"),
        Some(&ParamValue::Text("\u{e9}".to_owned()))
    );

    Ok(())
}

#[tokio::test]
async fn request_charset_beats_the_default() -> Result<()> {
    let uploader = Uploader::new().storage(Storage::Memory);

    let req = request_with(
        "multipart/form-data; boundary=AaB03x; charset=iso-8859-1",
        None,
        LATIN_FIELD,
    );
    let req = uploader.process(req).await?;

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert_eq!(
        multipart.get("latin"),
        Some(&ParamValue::Text("\u{e9}".to_owned()))
    );

    Ok(())
}

#[tokio::test]
async fn utf8_is_the_default_encoding() -> Result<()> {
    let uploader = Uploader::new().storage(Storage::Memory);

    let req = multipart_request(LATIN_FIELD, None);
    let req = uploader.process(req).await?;

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert_eq!(
        multipart.get("latin"),
        Some(&ParamValue::Text("\u{fffd}".to_owned()))
    );

    Ok(())
}

#[tokio::test]
async fn sessions_are_isolated() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let uploader = Uploader::new().store(store.clone()).storage(Storage::Memory);

    let req = multipart_request(FIELDS_AND_FILE, Some("ring-session=sess-a"));
    uploader.process(req).await?;
    let req = multipart_request(ONE_FIELD, Some("ring-session=sess-b"));
    uploader.process(req).await?;

    let a = progress_of(&store, "sess-a").unwrap();
    let b = progress_of(&store, "sess-b").unwrap();
    assert_eq!(a.bytes_read, FIELDS_AND_FILE.len() as u64);
    assert_eq!(a.item_count, 3);
    assert_eq!(b.bytes_read, ONE_FIELD.len() as u64);
    assert_eq!(b.item_count, 1);

    Ok(())
}

#[tokio::test]
async fn same_session_key_is_last_write_wins() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let uploader = Uploader::new().store(store.clone()).storage(Storage::Memory);

    let req = multipart_request(FIELDS_AND_FILE, Some("ring-session=shared"));
    uploader.process(req).await?;
    let req = multipart_request(ONE_FIELD, Some("ring-session=shared"));
    uploader.process(req).await?;

    let progress = progress_of(&store, "shared").unwrap();
    assert_eq!(progress.bytes_read, ONE_FIELD.len() as u64);
    assert_eq!(progress.item_count, 1);

    Ok(())
}

#[tokio::test]
async fn missing_cookie_disables_reporting() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let uploader = Uploader::new().store(store.clone()).storage(Storage::Memory);

    let req = multipart_request(ONE_FIELD, None);
    let req = uploader.process(req).await?;

    let MultipartParams(multipart) = req.extensions().get::<MultipartParams>().unwrap();
    assert_eq!(
        multipart.get("solo"),
        Some(&ParamValue::Text("value".to_owned()))
    );
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn cookie_name_can_be_overridden() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let uploader = Uploader::new()
        .store(store.clone())
        .storage(Storage::Memory)
        .cookie_name("sid");

    let req = multipart_request(ONE_FIELD, Some("ring-session=ignored; sid=custom"));
    uploader.process(req).await?;

    assert!(progress_of(&store, "custom").is_some());
    assert!(progress_of(&store, "ignored").is_none());

    Ok(())
}

#[tokio::test]
async fn truncated_body_fails_without_params() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let uploader = Uploader::new().store(store.clone()).storage(Storage::Memory);

    let req = multipart_request(TRUNCATED, Some("ring-session=sess-1"));
    let err = uploader.process(req).await.unwrap_err();

    assert!(matches!(err, Error::Incomplete));
    assert!(err.is_malformed());

    Ok(())
}

#[tokio::test]
async fn missing_boundary_is_malformed() -> Result<()> {
    let uploader = Uploader::new().storage(Storage::Memory);

    let req = request_with("multipart/form-data", None, ONE_FIELD);
    let err = uploader.process(req).await.unwrap_err();

    assert!(matches!(err, Error::MissingBoundary));
    assert!(err.is_malformed());

    Ok(())
}

#[tokio::test]
async fn session_store_failure_propagates() -> Result<()> {
    let uploader = Uploader::new()
        .store(Arc::new(FailingStore))
        .storage(Storage::Memory);

    let req = multipart_request(ONE_FIELD, Some("ring-session=sess-1"));
    let err = uploader.process(req).await.unwrap_err();

    assert!(matches!(err, Error::Session(_)));
    assert!(!err.is_malformed());

    Ok(())
}

#[tokio::test]
async fn handle_runs_the_next_stage() -> Result<()> {
    let uploader = Uploader::new().storage(Storage::Memory);

    let names = uploader
        .handle(multipart_request(FIELDS_AND_FILE, None), |req| async move {
            let Params(params) = req.extensions().get::<Params>().unwrap();
            params.iter().map(|(name, _)| name.to_owned()).collect::<Vec<_>>()
        })
        .await?;

    assert_eq!(names, ["a", "b", "f"]);

    Ok(())
}
