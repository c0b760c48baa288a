mod builder;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub use self::builder::*;
use crate::error::{ReidError, Result};
use crate::feature::FeatureVector;

/// 图库文件名
pub const GALLERY_FILE: &str = "gallery.bin";
/// 裁剪图片目录名
pub const CROPPED_DIR: &str = "cropped";

const GALLERY_MAGIC: [u8; 4] = *b"REID";
const GALLERY_VERSION: u32 = 1;

/// 单个视频的图库：图片 key 到特征向量
///
/// key 形如 `<视频目录名>/<裁剪图片文件名>`，按 key 排序存储
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoGallery {
    entries: BTreeMap<String, FeatureVector>,
}

/// 磁盘上的图库格式，特征按行优先展开
#[derive(Serialize, Deserialize)]
struct GalleryFile {
    magic: [u8; 4],
    version: u32,
    dim: u32,
    keys: Vec<String>,
    features: Vec<f32>,
}

impl VideoGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一条记录，所有向量维度必须一致
    pub fn insert(&mut self, key: String, feature: FeatureVector) -> Result<()> {
        if let Some(dim) = self.dim() {
            if dim != feature.dim() {
                return Err(ReidError::InvalidInput(format!(
                    "特征维度不一致: {} != {}",
                    feature.dim(),
                    dim
                )));
            }
        }
        self.entries.insert(key, feature);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> Option<usize> {
        self.entries.values().next().map(FeatureVector::dim)
    }

    pub fn get(&self, key: &str) -> Option<&FeatureVector> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureVector)> {
        self.entries.iter()
    }

    /// 返回视频目录下的图库文件路径
    pub fn path_in(video_dir: &Path) -> PathBuf {
        video_dir.join(GALLERY_FILE)
    }

    /// 保存图库
    ///
    /// 先写入同目录下的临时文件再重命名，读者不会看到写了一半的文件。
    /// 每次保存使用独立的临时文件，同一视频的并发构建互不干扰，最后完成的覆盖之前的结果
    pub fn save(&self, path: &Path) -> Result<()> {
        let dim = self.dim().unwrap_or(0);
        let mut keys = Vec::with_capacity(self.len());
        let mut features = Vec::with_capacity(self.len() * dim);
        for (key, feature) in &self.entries {
            keys.push(key.clone());
            features.extend_from_slice(feature.as_slice());
        }
        let file = GalleryFile {
            magic: GALLERY_MAGIC,
            version: GALLERY_VERSION,
            dim: dim as u32,
            keys,
            features,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::with_prefix_in(".gallery-", dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            bincode::serialize_into(&mut writer, &file)
                .map_err(|e| ReidError::corrupt(path, e))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        debug!("保存图库 {}: {} 条记录", path.display(), self.len());
        Ok(())
    }

    /// 加载图库，文件不存在时返回 `None`
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let data: GalleryFile = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| ReidError::corrupt(path, e))?;

        if data.magic != GALLERY_MAGIC {
            return Err(ReidError::corrupt(path, "文件头不匹配"));
        }
        if data.version != GALLERY_VERSION {
            return Err(ReidError::corrupt(path, format!("不支持的版本 {}", data.version)));
        }
        let dim = data.dim as usize;
        if data.features.len() != data.keys.len() * dim || (dim == 0 && !data.keys.is_empty()) {
            return Err(ReidError::corrupt(path, "特征数量与 key 数量不匹配"));
        }

        let mut entries = BTreeMap::new();
        for (key, row) in data.keys.into_iter().zip(data.features.chunks_exact(dim.max(1))) {
            entries.insert(key, FeatureVector::from_normalized(row.to_vec()));
        }
        Ok(Some(Self { entries }))
    }

    /// 导出为 `(keys, N x D 矩阵)`
    pub fn to_matrix(&self) -> (Vec<String>, Array2<f32>) {
        let dim = self.dim().unwrap_or(0);
        let mut matrix = Array2::zeros((self.len(), dim));
        let mut keys = Vec::with_capacity(self.len());
        for (mut row, (key, feature)) in matrix.rows_mut().into_iter().zip(&self.entries) {
            row.assign(&feature.view());
            keys.push(key.clone());
        }
        (keys, matrix)
    }
}
