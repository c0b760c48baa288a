use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;
use ndarray_npy::write_npy;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::gallery::VideoGallery;

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 上传视频相对于媒体根目录的路径
    pub video: String,
    /// 特征矩阵输出路径，同名的 `.txt` 文件保存每一行对应的 key
    #[arg(short, long, default_value = "gallery.npy")]
    pub output: PathBuf,
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let path = opts.media_root.gallery_file(&self.video)?;
        let gallery =
            VideoGallery::load(&path)?.ok_or_else(|| anyhow!("图库不存在: {}", path.display()))?;

        let (keys, matrix) = gallery.to_matrix();
        write_npy(&self.output, &matrix)?;
        fs::write(self.output.with_extension("txt"), keys.join("\n") + "\n")?;

        info!("导出成功: {} 条记录 -> {}", keys.len(), self.output.display());
        Ok(())
    }
}
