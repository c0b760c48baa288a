use anyhow::Result;
use clap::Parser;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::cli::search::print_result;
use crate::config::{ClientOptions, OutputFormat};
use crate::protocol::VideoRef;
use crate::utils::parse_video_arg;

#[derive(Parser, Debug, Clone)]
pub struct QueryCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// 案件 ID
    #[arg(long)]
    pub case_id: Option<u64>,
    /// 查询图片，相对于推理服务的媒体根目录
    pub query_img: String,
    /// 参与搜索的视频，格式为 `ID=PATH`
    #[arg(long = "video", value_name = "ID=PATH", value_parser = parse_video_arg, required = true)]
    pub videos: Vec<VideoRef>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for QueryCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let client = self.client.client();
        let result =
            client.query_feature(self.case_id, self.query_img.clone(), self.videos.clone()).await?;
        if result.is_empty() {
            eprintln!("没有找到匹配的行人");
        }
        print_result(&result, self.output_format)
    }
}
