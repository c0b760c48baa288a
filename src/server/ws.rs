use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use tokio::task::spawn_blocking;

use super::state::AppState;
use crate::error::{ReidError, Result};
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::rank::RankOptions;

/// 推理服务的 websocket 入口
pub async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state))
}

/// 逐条处理请求，每个请求回复一条消息
///
/// 单个请求失败只回复 `ok: false`，连接保持打开
async fn serve(mut socket: WebSocket, state: Arc<AppState>) {
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("websocket 连接错误: {e}");
                break;
            }
        };

        let response = match serde_json::from_str::<WorkerRequest>(text.as_str()) {
            Ok(request) => dispatch(&state, request).await,
            Err(e) => WorkerResponse::failed(format!("无法解析请求: {e}")),
        };

        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("无法序列化响应: {e}");
                break;
            }
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            debug!("客户端已断开");
            break;
        }
    }
}

async fn dispatch(state: &Arc<AppState>, request: WorkerRequest) -> WorkerResponse {
    let action = request.action();
    let result = match request {
        WorkerRequest::CreateGallery { video } => {
            let video_id = video.id.clone();
            let permit = state.build_limit.acquire().await;
            let state = state.clone();
            let r = run_blocking(move || {
                let dir = state.searcher.media_root().gallery_dir(&video.path)?;
                state.builder.build(&dir, &ProgressBar::hidden())
            })
            .await;
            drop(permit);
            r.map(|report| {
                info!("视频 {} 图库已生成: {} 条记录", video_id, report.entries);
                WorkerResponse::gallery_created(video_id)
            })
        }
        WorkerRequest::QueryFeature { case_id, query_img, videos, k, threshold } => {
            if let Some(case_id) = case_id {
                info!("案件 {case_id} 搜索行人: {query_img}");
            }
            let opts = RankOptions {
                k: k.unwrap_or(state.search.k),
                threshold: threshold.or(state.search.threshold),
            };
            let state = state.clone();
            run_blocking(move || state.searcher.search_file(&query_img, &videos, &opts))
                .await
                .map(WorkerResponse::query_results)
        }
        WorkerRequest::SuperResolution { obj_type, image } => {
            warn!("不支持超分辨率请求: {} {}", obj_type, image.path);
            Err(ReidError::InvalidInput("不支持超分辨率".to_string()))
        }
    };
    result.unwrap_or_else(|e| {
        error!("请求 {action} 失败: {e}");
        WorkerResponse::failed(e)
    })
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| ReidError::Model(format!("任务异常退出: {e}")))?
}
