use std::collections::HashMap;

use serde::Serialize;

use crate::aggregate::{AggregatedGallery, split_key};
use crate::error::{ReidError, Result};
use crate::feature::FeatureVector;

/// 每个视频默认保留的匹配数
pub const DEFAULT_TOP_K: usize = 5;
/// 默认相似度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    /// 每个视频保留的最大匹配数
    pub k: usize,
    /// 只保留相似度严格大于该值的匹配
    pub threshold: Option<f32>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self { k: DEFAULT_TOP_K, threshold: Some(DEFAULT_THRESHOLD) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub key: String,
    pub similarity: f32,
}

/// 一个视频的匹配结果，按相似度降序
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMatches {
    pub video_id: String,
    pub matches: Vec<RankedMatch>,
}

/// 计算查询向量与聚合图库中每条记录的相似度，并按视频分组
///
/// 先全局排序再分组，每个视频只保留全局顺序中属于它的前 K 条。
/// 分组的顺序为各视频最佳匹配在全局排序中出现的顺序，相似度相同时保持图库的迭代顺序。
/// 查询向量的维度必须与图库一致，见 [`check_dim`]
pub fn rank(query: &FeatureVector, gallery: &AggregatedGallery, opts: &RankOptions) -> Vec<VideoMatches> {
    let mut scored = gallery
        .iter()
        .map(|(key, feature)| (query.dot(feature), key))
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut groups: Vec<VideoMatches> = vec![];
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (similarity, key) in scored {
        if opts.threshold.is_some_and(|t| similarity <= t) {
            // 已经按降序排列，后面的都不会超过阈值
            break;
        }
        let Some((video_id, _)) = split_key(key) else {
            continue;
        };
        let i = *index.entry(video_id).or_insert_with(|| {
            groups.push(VideoMatches { video_id: video_id.to_string(), matches: vec![] });
            groups.len() - 1
        });
        let group = &mut groups[i];
        if group.matches.len() < opts.k {
            group.matches.push(RankedMatch { key: key.to_string(), similarity });
        }
    }

    groups.retain(|g| !g.matches.is_empty());
    groups
}

/// 检查查询向量与聚合图库的维度，空图库总是通过
pub fn check_dim(query: &FeatureVector, gallery: &AggregatedGallery) -> Result<()> {
    match gallery.dim() {
        Some(expected) if expected != query.dim() => {
            Err(ReidError::DimensionMismatch { expected, actual: query.dim() })
        }
        _ => Ok(()),
    }
}
