use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::ReidSearcher;
use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts, OutputFormat, SearchOptions};
use crate::extractor::preprocess;
use crate::format::QueryResult;
use crate::protocol::VideoRef;
use crate::utils::parse_video_arg;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 查询图片路径
    pub image: String,
    /// 参与搜索的视频，格式为 `ID=PATH`，PATH 相对于媒体根目录
    #[arg(long = "video", value_name = "ID=PATH", value_parser = parse_video_arg, required = true)]
    pub videos: Vec<VideoRef>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let extractor = self.model.load_extractor()?;
        let searcher = ReidSearcher::new(extractor, opts.media_root.clone());
        let rank = self.search.rank_options();

        let result = block_in_place(|| {
            let image = preprocess::imread(Path::new(&self.image))?;
            searcher.search(&image, &self.videos, &rank)
        })?;

        print_result(&result, self.output_format)
    }
}

pub(crate) fn print_result(result: &[QueryResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for video in result {
                for crop in &video.crop {
                    println!("{:.4}\t{}\t{}\t{}", crop.similarity, video.video_id, crop.time, crop.image);
                }
            }
        }
    }
    Ok(())
}
