use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::error::ReidError;
use crate::metrics;
use crate::protocol::VideoRef;
use crate::rank::RankOptions;

/// 在指定视频的图库中搜索上传的行人图片
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "图片无法解码或参数错误"),
        (status = 401, description = "token 错误"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    if token != state.token {
        return Err(AppError::Unauthorized);
    }

    let videos: Vec<VideoRef> = serde_json::from_str(&data.videos)
        .map_err(|e| ReidError::InvalidInput(format!("videos 格式错误: {e}")))?;
    let opts = RankOptions {
        k: data.k.unwrap_or(state.search.k),
        threshold: data.threshold.or(state.search.threshold),
    };

    let start = Instant::now();

    info!("正在搜索上传图片，共 {} 个视频", videos.len());

    let result = block_in_place(|| state.searcher.search_image(&data.file, &videos, &opts))?;

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result }))
}

/// prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}
