//! 推理服务的消息格式
//!
//! 每个请求是一条 JSON 文本消息，通过 `action` 字段区分类型，服务对每个请求回复一条消息。

use serde::{Deserialize, Serialize};

use crate::aggregate::VideoId;
use crate::format::QueryResult;

/// 视频引用，`path` 为上传文件相对于媒体根目录的路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: VideoId,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: u64,
    pub path: String,
    /// 需要处理的像素区域
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// 为视频构建图库
    CreateGallery { video: VideoRef },
    /// 图片超分辨率
    #[serde(alias = "improve_resolution")]
    SuperResolution {
        #[serde(rename = "type")]
        obj_type: String,
        image: ImageRef,
    },
    /// 提取查询图片特征并在案件的所有视频中搜索
    QueryFeature {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        case_id: Option<u64>,
        query_img: String,
        videos: Vec<VideoRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        k: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
    },
}

impl WorkerRequest {
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateGallery { .. } => "create_gallery",
            Self::SuperResolution { .. } => "super_resolution",
            Self::QueryFeature { .. } => "query_feature",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<QueryResult>>,
}

impl WorkerResponse {
    pub fn failed(error: impl ToString) -> Self {
        Self { ok: false, error: Some(error.to_string()), ..Default::default() }
    }

    pub fn gallery_created(video_id: VideoId) -> Self {
        Self { ok: true, video_id: Some(video_id), ..Default::default() }
    }

    pub fn query_results(results: Vec<QueryResult>) -> Self {
        Self { ok: true, results: Some(results), ..Default::default() }
    }
}
