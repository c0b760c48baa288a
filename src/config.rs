use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use log::info;

use crate::cli::*;
use crate::client::InferenceClient;
use crate::error::{ReidError, Result};
use crate::extractor::{Extractor, OnnxReidModel};
use crate::gallery::{CROPPED_DIR, GALLERY_FILE};
use crate::rank::{DEFAULT_THRESHOLD, DEFAULT_TOP_K, RankOptions};

static MEDIA_ROOT: LazyLock<PathBuf> = LazyLock::new(|| {
    let proj_dirs =
        ProjectDirs::from("", "reidsearch", "reidsearch").expect("failed to get project dir");
    proj_dirs.data_dir().to_path_buf()
});

fn default_media_root() -> &'static str {
    MEDIA_ROOT.to_str().unwrap_or(".")
}

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// ReID 模型文件（ONNX）
    #[arg(short, long, value_name = "FILE", env = "REID_MODEL")]
    pub model: PathBuf,
    /// 推理批次大小
    #[arg(short, long, value_name = "SIZE", default_value_t = 32, value_parser = parse_batch_size)]
    pub batch_size: usize,
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("批次大小必须大于 0".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

impl ModelOptions {
    /// 加载模型并创建特征提取器
    pub fn load_extractor(&self) -> Result<Arc<Extractor>> {
        info!("加载模型: {}", self.model.display());
        let model = OnnxReidModel::load(&self.model, self.batch_size)?;
        Ok(Arc::new(Extractor::new(Box::new(model), self.batch_size)))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 每个视频保留的最大匹配数量
    #[arg(short, value_name = "K", default_value_t = DEFAULT_TOP_K)]
    pub k: usize,
    /// 相似度阈值，只保留大于该值的匹配
    #[arg(long, value_name = "SIMILARITY", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,
    /// 不使用相似度阈值
    #[arg(long)]
    pub no_threshold: bool,
}

impl SearchOptions {
    pub fn rank_options(&self) -> RankOptions {
        RankOptions { k: self.k, threshold: (!self.no_threshold).then_some(self.threshold) }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ClientOptions {
    /// 推理服务地址
    #[arg(long, value_name = "URL", default_value = "ws://127.0.0.1:8000/ws")]
    pub worker: String,
    /// 图库构建请求超时时间，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 600)]
    pub timeout: u64,
    /// 搜索请求超时时间，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub query_timeout: u64,
}

impl ClientOptions {
    pub fn client(&self) -> InferenceClient {
        InferenceClient::new(self.worker.clone(), Duration::from_secs(self.timeout))
            .with_query_timeout(Duration::from_secs(self.query_timeout))
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "reidsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 媒体根目录，视频与图库路径均相对于此目录
    #[arg(short = 'r', long, default_value = default_media_root())]
    pub media_root: MediaRoot,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 为一个视频目录构建图库
    Build(BuildCommand),
    /// 在本地图库中搜索行人
    Search(SearchCommand),
    /// 启动推理服务
    Server(ServerCommand),
    /// 请求推理服务为视频构建图库
    Submit(SubmitCommand),
    /// 请求推理服务搜索行人
    Query(QueryCommand),
    /// 导出图库为 npy 文件
    Export(ExportCommand),
    /// 显示图库信息
    Show(ShowCommand),
}

/// 媒体根目录
#[derive(Debug, Clone)]
pub struct MediaRoot {
    path: PathBuf,
}

impl MediaRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 解析相对路径，拒绝绝对路径和 `..`
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if rel.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return Err(ReidError::InvalidInput(format!("非法路径: {relative}")));
        }
        Ok(self.path.join(rel))
    }

    /// 视频的图库目录：`<上传文件所在目录>/gallery`
    pub fn gallery_dir(&self, upload: &str) -> Result<PathBuf> {
        let path = self.resolve(upload)?;
        let parent = path.parent().unwrap_or(&self.path);
        Ok(parent.join("gallery"))
    }

    /// 视频的图库文件
    pub fn gallery_file(&self, upload: &str) -> Result<PathBuf> {
        Ok(self.gallery_dir(upload)?.join(GALLERY_FILE))
    }

    /// 裁剪图片目录，相对于媒体根目录
    pub fn crop_dir_relative(upload: &str) -> String {
        match Path::new(upload).parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => format!("{}/gallery/{}", parent.display(), CROPPED_DIR),
            None => format!("gallery/{}", CROPPED_DIR),
        }
    }
}

impl FromStr for MediaRoot {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_paths() {
        let root = MediaRoot::new("/var/www");
        let upload = "data/case/1/video/3/cam.mp4";
        assert_eq!(
            root.gallery_dir(upload).unwrap(),
            PathBuf::from("/var/www/data/case/1/video/3/gallery")
        );
        assert_eq!(
            root.gallery_file(upload).unwrap(),
            PathBuf::from("/var/www/data/case/1/video/3/gallery/gallery.bin")
        );
        assert_eq!(MediaRoot::crop_dir_relative(upload), "data/case/1/video/3/gallery/cropped");
        assert_eq!(MediaRoot::crop_dir_relative("cam.mp4"), "gallery/cropped");
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let root = MediaRoot::new("/var/www");
        assert!(root.resolve("../etc/passwd").is_err());
        assert!(root.resolve("/etc/passwd").is_err());
        assert!(root.resolve("a/./b.jpg").is_ok());
    }

    #[test]
    fn test_batch_size_must_be_positive() {
        let parse = |size: &str| {
            Opts::try_parse_from(["reidsearch", "build", "-m", "reid.onnx", "-b", size, "cam.mp4"])
        };
        assert!(parse("0").is_err());
        assert!(parse("-1").is_err());
        let Ok(Opts { subcmd: SubCommand::Build(build), .. }) = parse("1") else {
            panic!("build 参数解析失败");
        };
        assert_eq!(build.model.batch_size, 1);
    }

    #[test]
    fn test_search_options() {
        let opts = SearchOptions { k: 3, threshold: 0.5, no_threshold: true };
        let rank = opts.rank_options();
        assert_eq!(rank.k, 3);
        assert_eq!(rank.threshold, None);
    }
}
