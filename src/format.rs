use std::collections::HashMap;
use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aggregate::split_key;
use crate::rank::VideoMatches;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)").expect("failed to build regex"));

/// 单个裁剪图片的匹配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropResult {
    /// 裁剪图片路径（相对于媒体根目录）
    pub image: String,
    /// 所在视频的秒数
    pub time: u64,
    pub similarity: f32,
}

/// 一个视频的搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rec_date: Option<String>,
    pub crop: Vec<CropResult>,
}

/// 外部视频信息
#[derive(Debug, Clone, Default)]
pub struct VideoInfo {
    /// 裁剪图片所在目录（相对于媒体根目录）
    pub crop_dir: Option<String>,
    pub thumbnail: Option<String>,
    pub uri: Option<String>,
    pub rec_date: Option<String>,
}

/// 由外部视频/案件存储提供的视频信息
pub trait VideoCatalog {
    fn describe(&self, video_id: &str) -> Option<VideoInfo>;
}

impl VideoCatalog for HashMap<String, VideoInfo> {
    fn describe(&self, video_id: &str) -> Option<VideoInfo> {
        self.get(video_id).cloned()
    }
}

/// 从裁剪图片文件名中解析秒数，文件名形如 `<秒数>_<序号>.jpg`
pub fn parse_time(crop: &str) -> Option<u64> {
    TIMESTAMP.captures(crop).and_then(|c| c[1].parse().ok())
}

/// 将排序结果转换为对外的搜索结果，保持排序顺序
pub fn format_results(ranked: Vec<VideoMatches>, catalog: &dyn VideoCatalog) -> Vec<QueryResult> {
    ranked
        .into_iter()
        .map(|group| {
            let info = catalog.describe(&group.video_id).unwrap_or_default();
            let crop = group
                .matches
                .into_iter()
                .map(|m| {
                    let name = split_key(&m.key).map_or(m.key.as_str(), |(_, name)| name);
                    let time = parse_time(name).unwrap_or_else(|| {
                        warn!("无法从文件名解析时间: {}", m.key);
                        0
                    });
                    let image = match &info.crop_dir {
                        Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), name),
                        None => m.key.clone(),
                    };
                    CropResult { image, time, similarity: m.similarity }
                })
                .collect();
            QueryResult {
                video_id: group.video_id,
                thumbnail: info.thumbnail,
                uri: info.uri,
                rec_date: info.rec_date,
                crop,
            }
        })
        .collect()
}
