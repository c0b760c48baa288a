mod common;

use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use common::*;
use futures::StreamExt;
use reidsearch::client::InferenceClient;
use reidsearch::config::MediaRoot;
use reidsearch::error::{InferenceFailure, ReidError};
use reidsearch::jobs::{GalleryJobs, JobOutcome};
use reidsearch::protocol::{ImageRef, VideoRef};
use reidsearch::rank::RankOptions;
use reidsearch::{ReidSearcher, server};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

const UPLOAD: &str = "data/case/1/video/7/cam.mp4";

/// 在随机端口启动推理服务
async fn spawn_worker(root: &TempDir) -> Result<SocketAddr> {
    let searcher = ReidSearcher::new(extractor(ChannelMeanModel), MediaRoot::new(root.path()));
    let state = server::AppState::new(searcher, RankOptions::default(), "token".to_string());
    let app = server::create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(addr)
}

fn media() -> Result<TempDir> {
    let root = TempDir::new()?;
    let gallery_dir = MediaRoot::new(root.path()).gallery_dir(UPLOAD)?;
    write_crops(
        &gallery_dir,
        &[("0003_0.jpg", [220, 30, 30]), ("0008_0.jpg", [30, 220, 30]), ("0011_2.jpg", [30, 30, 220])],
    );
    write_image(&root.path().join("data/query/image.png"), [30, 220, 30]);
    Ok(root)
}

fn client(addr: SocketAddr) -> InferenceClient {
    InferenceClient::new(format!("ws://{addr}/ws"), Duration::from_secs(10))
}

fn video() -> VideoRef {
    VideoRef { id: 7u64.into(), path: UPLOAD.to_string() }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_gallery_then_query() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;
    let client = client(addr);

    let video_id = client.create_gallery(video()).await?;
    assert_eq!(video_id.as_str(), "7");
    assert!(MediaRoot::new(root.path()).gallery_file(UPLOAD)?.is_file());

    let result = client.query_feature(Some(1), "data/query/image.png".to_string(), vec![video()]).await?;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].video_id, "7");
    assert_eq!(result[0].crop[0].time, 8);
    assert_eq!(result[0].crop[0].image, "data/case/1/video/7/gallery/cropped/0008_0.jpg");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn query_before_gallery_is_empty() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;

    let result = client(addr).query_feature(None, "data/query/image.png".to_string(), vec![video()]).await?;
    assert!(result.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_query_is_an_error() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;

    let err = client(addr)
        .query_feature(Some(1), "data/query/missing.png".to_string(), vec![video()])
        .await
        .unwrap_err();
    assert!(matches!(err, ReidError::InferenceUnavailable(InferenceFailure::Rejected(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_crops_are_rejected() -> Result<()> {
    let root = TempDir::new()?;
    let addr = spawn_worker(&root).await?;

    let err = client(addr).create_gallery(video()).await.unwrap_err();
    assert!(matches!(err, ReidError::InferenceUnavailable(InferenceFailure::Rejected(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn super_resolution_is_unsupported() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;

    let image = ImageRef { id: 1, path: "data/query/image.png".to_string(), location: None };
    let err = client(addr).super_resolution("person".to_string(), image).await.unwrap_err();
    assert!(matches!(err, ReidError::InferenceUnavailable(InferenceFailure::Rejected(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_worker_times_out() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = InferenceClient::new(format!("ws://{addr}/"), Duration::from_millis(200));
    let err = client.create_gallery(video()).await.unwrap_err();
    assert!(matches!(err, ReidError::InferenceUnavailable(InferenceFailure::Timeout(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_worker() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let err = client(addr).create_gallery(video()).await.unwrap_err();
    assert!(matches!(err, ReidError::InferenceUnavailable(InferenceFailure::Connection(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn background_jobs_report_outcome() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;

    let (jobs, mut rx) = GalleryJobs::new(client(addr));
    jobs.submit(video());
    jobs.submit(VideoRef { id: 9u64.into(), path: "data/case/1/video/9/cam.mp4".to_string() });
    drop(jobs);

    let mut preprocessed = vec![];
    let mut failed = vec![];
    while let Some(outcome) = rx.recv().await {
        match outcome {
            JobOutcome::Preprocessed(id) => preprocessed.push(id.to_string()),
            JobOutcome::Failed(id, _) => failed.push(id.to_string()),
        }
    }
    assert_eq!(preprocessed, ["7"]);
    assert_eq!(failed, ["9"]);
    Ok(())
}

async fn post_search(
    addr: SocketAddr,
    token: &str,
    file: Vec<u8>,
    fields: &[(&str, String)],
) -> Result<reqwest::Response> {
    let mut form = Form::new().part("file", Part::bytes(file).file_name("query.png"));
    for (name, value) in fields {
        form = form.text(name.to_string(), value.clone());
    }
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/search"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await?;
    Ok(response)
}

fn videos_field() -> (&'static str, String) {
    ("videos", json!([{ "id": 7, "path": UPLOAD }]).to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn http_search_with_overrides() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;
    client(addr).create_gallery(video()).await?;
    let image = fs::read(root.path().join("data/query/image.png"))?;

    let response = post_search(addr, "token", image.clone(), &[videos_field()]).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert!(body["time"].is_u64());
    assert_eq!(body["result"][0]["video_id"], "7");
    assert_eq!(body["result"][0]["crop"].as_array().map(Vec::len), Some(1));

    let fields = [videos_field(), ("k", "2".to_string()), ("threshold", "-1.5".to_string())];
    let body: Value = post_search(addr, "token", image, &fields).await?.json().await?;
    assert_eq!(body["result"][0]["crop"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn http_search_wrong_token() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;
    let image = fs::read(root.path().join("data/query/image.png"))?;

    let response = post_search(addr, "nope", image, &[videos_field()]).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn http_search_bad_input() -> Result<()> {
    let root = media()?;
    let addr = spawn_worker(&root).await?;

    let response = post_search(addr, "token", b"not an image".to_vec(), &[videos_field()]).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let image = fs::read(root.path().join("data/query/image.png"))?;
    let response = post_search(addr, "token", image, &[("videos", "{oops".to_string())]).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
