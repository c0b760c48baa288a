use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use tokio::task::block_in_place;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::config::ModelOptions;
use crate::gallery::GalleryBuilder;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 上传视频相对于媒体根目录的路径，图库生成在同级的 gallery 目录
    pub video: String,
}

impl SubCommandExtend for BuildCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let extractor = self.model.load_extractor()?;
        let builder = GalleryBuilder::new(extractor);
        let dir = opts.media_root.gallery_dir(&self.video)?;

        let pb = ProgressBar::no_length().with_style(pb_style());
        let report = block_in_place(|| builder.build(&dir, &pb))?;
        pb.finish_and_clear();

        info!("构建图库成功: {}，{} 条记录，跳过 {} 张", report.path.display(), report.entries, report.skipped);
        Ok(())
    }
}
