use log::{error, info};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::aggregate::VideoId;
use crate::client::InferenceClient;
use crate::error::ReidError;
use crate::protocol::VideoRef;

/// 图库构建任务的结果
#[derive(Debug)]
pub enum JobOutcome {
    /// 图库已生成，视频可以标记为已预处理
    Preprocessed(VideoId),
    /// 构建失败，视频保持未预处理状态，是否重试由调用方决定
    Failed(VideoId, ReidError),
}

/// 后台图库构建任务
///
/// 提交后立即返回，结果通过通道报告
pub struct GalleryJobs {
    client: InferenceClient,
    tx: UnboundedSender<JobOutcome>,
}

impl GalleryJobs {
    pub fn new(client: InferenceClient) -> (Self, UnboundedReceiver<JobOutcome>) {
        let (tx, rx) = unbounded_channel();
        (Self { client, tx }, rx)
    }

    pub fn submit(&self, video: VideoRef) -> JoinHandle<()> {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let video_id = video.id.clone();
            info!("提交图库构建任务: {}", video_id);
            let outcome = match client.create_gallery(video).await {
                Ok(id) => {
                    info!("图库构建完成: {}", id);
                    JobOutcome::Preprocessed(id)
                }
                Err(e) => {
                    error!("图库构建失败 {}: {}", video_id, e);
                    JobOutcome::Failed(video_id, e)
                }
            };
            // 接收端已经关闭时忽略结果
            let _ = tx.send(outcome);
        })
    }
}
