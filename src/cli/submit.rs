use anyhow::Result;
use clap::Parser;
use log::{error, info};

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::config::ClientOptions;
use crate::jobs::{GalleryJobs, JobOutcome};
use crate::protocol::VideoRef;
use crate::utils::parse_video_arg;

#[derive(Parser, Debug, Clone)]
pub struct SubmitCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// 需要构建图库的视频，格式为 `ID=PATH`
    #[arg(value_name = "ID=PATH", value_parser = parse_video_arg, required = true)]
    pub videos: Vec<VideoRef>,
}

impl SubCommandExtend for SubmitCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let client = self.client.client();
        let (jobs, mut rx) = GalleryJobs::new(client);
        for video in &self.videos {
            jobs.submit(video.clone());
        }
        drop(jobs);

        let mut failed = 0;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                JobOutcome::Preprocessed(id) => println!("[OK] {id}"),
                JobOutcome::Failed(id, e) => {
                    println!("[ERR] {id}: {e}");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            error!("{} 个视频构建失败", failed);
            anyhow::bail!("{failed} 个视频构建失败");
        }
        info!("全部 {} 个视频构建完成", self.videos.len());
        Ok(())
    }
}
