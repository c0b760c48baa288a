use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::aggregate::VideoId;
use crate::error::{InferenceFailure, ReidError, Result};
use crate::format::QueryResult;
use crate::protocol::{ImageRef, VideoRef, WorkerRequest, WorkerResponse};

/// 推理服务客户端
///
/// 每次请求建立一个连接，发送一条请求并等待一条响应，整个往返受超时限制，不做重试
#[derive(Debug, Clone)]
pub struct InferenceClient {
    url: String,
    timeout: Duration,
    query_timeout: Duration,
}

impl InferenceClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout, query_timeout: timeout }
    }

    /// 单独设置搜索请求的超时时间
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 请求为视频构建图库，返回服务确认的视频 ID
    pub async fn create_gallery(&self, video: VideoRef) -> Result<VideoId> {
        let response = self.request(&WorkerRequest::CreateGallery { video }).await?;
        response
            .video_id
            .ok_or_else(|| InferenceFailure::Malformed("缺少 video_id".to_string()).into())
    }

    /// 请求搜索行人
    ///
    /// 返回空列表表示没有匹配
    pub async fn query_feature(
        &self,
        case_id: Option<u64>,
        query_img: String,
        videos: Vec<VideoRef>,
    ) -> Result<Vec<QueryResult>> {
        let request = WorkerRequest::QueryFeature { case_id, query_img, videos, k: None, threshold: None };
        let response = self.request_with_timeout(&request, self.query_timeout).await?;
        response
            .results
            .ok_or_else(|| InferenceFailure::Malformed("缺少 results".to_string()).into())
    }

    /// 请求图片超分辨率，返回 `(图片 ID, 结果路径)`
    pub async fn super_resolution(&self, obj_type: String, image: ImageRef) -> Result<(u64, String)> {
        let response = self.request(&WorkerRequest::SuperResolution { obj_type, image }).await?;
        match (response.image_id, response.path) {
            (Some(id), Some(path)) => Ok((id, path)),
            _ => Err(InferenceFailure::Malformed("缺少 image_id 或 path".to_string()).into()),
        }
    }

    /// 发送一个请求并等待响应，`ok: false` 转换为错误
    pub async fn request(&self, request: &WorkerRequest) -> Result<WorkerResponse> {
        self.request_with_timeout(request, self.timeout).await
    }

    async fn request_with_timeout(&self, request: &WorkerRequest, limit: Duration) -> Result<WorkerResponse> {
        debug!("发送请求 {} 到 {}", request.action(), self.url);
        let response = timeout(limit, self.round_trip(request))
            .await
            .map_err(|_| InferenceFailure::Timeout(limit))??;
        if !response.ok {
            let reason = response.error.unwrap_or_else(|| "未知错误".to_string());
            return Err(ReidError::InferenceUnavailable(InferenceFailure::Rejected(reason)));
        }
        Ok(response)
    }

    async fn round_trip(&self, request: &WorkerRequest) -> Result<WorkerResponse> {
        let payload =
            serde_json::to_string(request).map_err(|e| ReidError::InvalidInput(e.to_string()))?;

        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| InferenceFailure::Connection(e.to_string()))?;
        socket
            .send(Message::text(payload))
            .await
            .map_err(|e| InferenceFailure::Connection(e.to_string()))?;

        let response = loop {
            let message = socket
                .next()
                .await
                .ok_or_else(|| InferenceFailure::Connection("连接已关闭".to_string()))?
                .map_err(|e| InferenceFailure::Connection(e.to_string()))?;
            match message {
                Message::Text(text) => break text,
                Message::Close(_) => {
                    return Err(InferenceFailure::Connection("连接已关闭".to_string()).into());
                }
                _ => continue,
            }
        };
        let _ = socket.close(None).await;

        serde_json::from_str(response.as_str())
            .map_err(|e| InferenceFailure::Malformed(e.to_string()).into())
    }
}
