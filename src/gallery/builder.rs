use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::{CROPPED_DIR, VideoGallery};
use crate::error::{ReidError, Result};
use crate::extractor::{Extractor, preprocess};
use crate::metrics;

/// 图库构建结果
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// 图库文件路径
    pub path: PathBuf,
    /// 成功写入的记录数
    pub entries: usize,
    /// 因解码失败或特征退化而跳过的图片数
    pub skipped: usize,
}

/// 视频图库构建器
pub struct GalleryBuilder {
    extractor: Arc<Extractor>,
}

impl GalleryBuilder {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }

    /// 列出 `<video_dir>/cropped/*.jpg`，按文件名排序
    pub fn list_crops(video_dir: &Path) -> Result<Vec<PathBuf>> {
        let cropped = video_dir.join(CROPPED_DIR);
        if !cropped.is_dir() {
            return Err(ReidError::CropsMissing(cropped));
        }
        let mut crops = vec![];
        for entry in WalkDir::new(&cropped).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ReidError::Io(e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("jpg")) {
                crops.push(path.to_path_buf());
            }
        }
        Ok(crops)
    }

    /// 为一个视频构建图库并保存到 `<video_dir>/gallery.bin`
    ///
    /// 无法解码的图片会被跳过，不会中断整个构建
    pub fn build(&self, video_dir: &Path, pb: &ProgressBar) -> Result<BuildReport> {
        let start = Instant::now();
        let crops = Self::list_crops(video_dir)?;
        let prefix = video_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| ReidError::InvalidInput(format!("无效的视频目录: {}", video_dir.display())))?;

        info!("开始构建图库: {}，共 {} 张裁剪图片", video_dir.display(), crops.len());
        pb.set_length(crops.len() as u64);

        let mut gallery = VideoGallery::new();
        let mut skipped = 0;

        for chunk in crops.chunks(self.extractor.batch_size()) {
            let decoded = chunk
                .par_iter()
                .map(|path| preprocess::imread(path).map(|img| preprocess::to_tensor(&img)))
                .collect::<Vec<_>>();

            let mut names = vec![];
            let mut tensors = vec![];
            for (path, tensor) in chunk.iter().zip(decoded) {
                match tensor {
                    Ok(tensor) => {
                        names.push(path);
                        tensors.push(tensor);
                    }
                    Err(e) => {
                        pb.println(format!("跳过无法解码的图片: {e}"));
                        skipped += 1;
                    }
                }
            }
            pb.inc((chunk.len() - names.len()) as u64);
            if tensors.is_empty() {
                continue;
            }

            let features = self.extractor.extract_tensors(&tensors)?;
            for (path, feature) in names.into_iter().zip(features) {
                pb.inc(1);
                let feature = match feature {
                    Ok(feature) => feature,
                    Err(e) => {
                        warn!("跳过 {}: {}", path.display(), e);
                        skipped += 1;
                        continue;
                    }
                };
                let Some(file_name) = path.file_name() else {
                    continue;
                };
                let key = format!("{}/{}", prefix, file_name.to_string_lossy());
                gallery.insert(key, feature)?;
            }
        }

        let path = VideoGallery::path_in(video_dir);
        gallery.save(&path)?;

        let elapsed = start.elapsed().as_secs_f32();
        metrics::observe_gallery_build(gallery.len(), skipped, elapsed);
        info!(
            "图库构建完成: {}，{} 条记录，跳过 {} 张，耗时 {:.2}s",
            path.display(),
            gallery.len(),
            skipped,
            elapsed
        );

        Ok(BuildReport { path, entries: gallery.len(), skipped })
    }
}
