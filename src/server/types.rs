use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::Serialize;
use utoipa::ToSchema;

use crate::format::QueryResult;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Bytes,
    pub videos: String,
    pub k: Option<usize>,
    pub threshold: Option<f32>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 查询图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 参与搜索的视频，JSON 数组，格式为 `[{"id": 1, "path": "data/case/1/video/1/a.mp4"}]`
    pub videos: String,
    /// 每个视频保留的最大匹配数量
    pub k: Option<usize>,
    /// 相似度阈值
    pub threshold: Option<f32>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 每个视频的搜索结果
    #[schema(value_type = Vec<Object>)]
    pub result: Vec<QueryResult>,
}
