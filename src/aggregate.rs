use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ReidError, Result};
use crate::feature::FeatureVector;
use crate::gallery::VideoGallery;

/// 视频 ID，不能为空且不能包含 `/`
///
/// 协议中既可能是数字也可能是字符串，统一按字符串处理
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VideoId {
    type Err = ReidError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.contains('/') {
            return Err(ReidError::InvalidInput(format!("无效的视频 ID: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<u64> for VideoId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VideoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(id.into()),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// 参与聚合的一个视频图库
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub video_id: VideoId,
    pub gallery_path: PathBuf,
}

/// 一次搜索使用的聚合图库，key 为 `<video_id>/<裁剪图片文件名>`
#[derive(Debug, Clone, Default)]
pub struct AggregatedGallery {
    entries: Vec<(String, FeatureVector)>,
}

impl AggregatedGallery {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 特征维度，空图库为 `None`
    pub fn dim(&self) -> Option<usize> {
        self.entries.first().map(|(_, f)| f.dim())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 由已经改写过 key 的记录创建，所有特征的维度必须一致
    pub fn from_entries(entries: Vec<(String, FeatureVector)>) -> Result<Self> {
        if let Some((_, first)) = entries.first() {
            let expected = first.dim();
            if let Some((_, f)) = entries.iter().find(|(_, f)| f.dim() != expected) {
                return Err(ReidError::DimensionMismatch { expected, actual: f.dim() });
            }
        }
        Ok(Self { entries })
    }

    /// 追加一个视频的全部记录，key 中的目录部分替换为视频 ID
    ///
    /// 图库维度与已有记录不一致时返回错误，不追加任何记录
    pub fn extend(&mut self, video_id: &VideoId, gallery: &VideoGallery) -> Result<()> {
        if let (Some(expected), Some(actual)) = (self.dim(), gallery.dim()) {
            if expected != actual {
                return Err(ReidError::DimensionMismatch { expected, actual });
            }
        }
        self.entries.reserve(gallery.len());
        for (key, feature) in gallery.iter() {
            let crop = key.rsplit_once('/').map_or(key.as_str(), |(_, name)| name);
            self.entries.push((format!("{video_id}/{crop}"), feature.clone()));
        }
        Ok(())
    }
}

/// 从聚合 key 中拆出 `(视频 ID, 裁剪图片文件名)`
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}

/// 聚合多个视频的图库
///
/// 图库文件并行读取，全部读完后再合并。尚未生成图库的视频直接跳过
pub fn aggregate(sources: &[VideoSource]) -> Result<AggregatedGallery> {
    let mut seen = HashSet::new();
    for source in sources {
        if !seen.insert(&source.video_id) {
            return Err(ReidError::InvalidInput(format!("重复的视频 ID: {}", source.video_id)));
        }
    }

    let galleries = sources
        .par_iter()
        .map(|source| VideoGallery::load(&source.gallery_path))
        .collect::<Result<Vec<_>>>()?;

    let mut aggregated = AggregatedGallery::default();
    for (source, gallery) in sources.iter().zip(galleries) {
        match gallery {
            Some(gallery) => aggregated.extend(&source.video_id, &gallery).map_err(|e| {
                warn!("视频 {} 的图库维度与其他视频不一致: {}", source.video_id, e);
                e
            })?,
            None => debug!("视频 {} 尚无图库，跳过", source.video_id),
        }
    }
    debug!("聚合 {} 个视频，共 {} 条记录", sources.len(), aggregated.len());
    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use ndarray::ArrayView1;

    use super::*;

    fn feature(v: &[f32]) -> FeatureVector {
        FeatureVector::normalized(ArrayView1::from(v)).unwrap()
    }

    #[test]
    fn test_video_id_parse() {
        assert_eq!("42".parse::<VideoId>().unwrap().as_str(), "42");
        assert!("".parse::<VideoId>().is_err());
        assert!("a/b".parse::<VideoId>().is_err());
    }

    #[test]
    fn test_video_id_deserialize_number_or_string() {
        let a: VideoId = serde_json::from_str("17").unwrap();
        let b: VideoId = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<VideoId>("\"x/y\"").is_err());
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"17\"");
    }

    #[test]
    fn test_extend_rewrites_directory() {
        let mut gallery = VideoGallery::new();
        gallery.insert("vidA/0001.jpg".into(), feature(&[1., 0.])).unwrap();
        let mut aggregated = AggregatedGallery::default();
        aggregated.extend(&"7".parse().unwrap(), &gallery).unwrap();

        let keys = aggregated.iter().map(|(k, _)| k.to_string()).collect::<Vec<_>>();
        assert_eq!(keys, ["7/0001.jpg"]);
        assert_eq!(split_key(&keys[0]), Some(("7", "0001.jpg")));
    }

    #[test]
    fn test_extend_rejects_other_dimension() {
        let mut a = VideoGallery::new();
        a.insert("x/1.jpg".into(), feature(&[1., 0.])).unwrap();
        let mut b = VideoGallery::new();
        b.insert("y/1.jpg".into(), feature(&[1., 0., 0.])).unwrap();

        let mut aggregated = AggregatedGallery::default();
        aggregated.extend(&"1".parse().unwrap(), &a).unwrap();
        let err = aggregated.extend(&"2".parse().unwrap(), &b).unwrap_err();
        assert!(matches!(err, ReidError::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(aggregated.len(), 1);

        // 空图库不参与维度检查
        aggregated.extend(&"3".parse().unwrap(), &VideoGallery::new()).unwrap();
    }

    #[test]
    fn test_from_entries_checks_dimension() {
        let ok = AggregatedGallery::from_entries(vec![("1/a.jpg".into(), feature(&[1., 0.]))]).unwrap();
        assert_eq!(ok.dim(), Some(2));
        assert_eq!(AggregatedGallery::from_entries(vec![]).unwrap().dim(), None);

        let err = AggregatedGallery::from_entries(vec![
            ("1/a.jpg".into(), feature(&[1., 0.])),
            ("2/a.jpg".into(), feature(&[1., 0., 0.])),
        ])
        .unwrap_err();
        assert!(matches!(err, ReidError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_aggregate_rejects_duplicate_video() {
        let source = VideoSource { video_id: "1".parse().unwrap(), gallery_path: "x".into() };
        let err = aggregate(&[source.clone(), source]).unwrap_err();
        assert!(matches!(err, ReidError::InvalidInput(_)));
    }
}
