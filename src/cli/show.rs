use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::gallery::VideoGallery;

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// 上传视频相对于媒体根目录的路径
    pub video: String,
    /// 同时列出所有 key
    #[arg(short, long)]
    pub list: bool,
}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let path = opts.media_root.gallery_file(&self.video)?;
        let Some(gallery) = VideoGallery::load(&path)? else {
            println!("{}: 图库尚未生成", path.display());
            return Ok(());
        };

        println!("path   : {}", path.display());
        println!("entries: {}", gallery.len());
        println!("dim    : {}", gallery.dim().unwrap_or(0));
        if self.list {
            for (key, _) in gallery.iter() {
                println!("{key}");
            }
        }
        Ok(())
    }
}
