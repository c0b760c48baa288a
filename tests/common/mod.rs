#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use ndarray::{Array1, Array2, ArrayView4, Axis};
use reidsearch::extractor::{Extractor, ReidModel};
use reidsearch::feature::FeatureVector;
use reidsearch::gallery::{CROPPED_DIR, VideoGallery};
use reidsearch::Result;

/// 对每个通道求均值作为特征
pub struct ChannelMeanModel;

impl ReidModel for ChannelMeanModel {
    fn forward(&self, batch: ArrayView4<f32>) -> Result<Vec<Array2<f32>>> {
        let n = batch.len_of(Axis(0));
        let mut out = Array2::zeros((n, 3));
        for (i, sample) in batch.axis_iter(Axis(0)).enumerate() {
            for (c, channel) in sample.axis_iter(Axis(0)).enumerate() {
                out[[i, c]] = channel.mean().unwrap_or(0.);
            }
        }
        Ok(vec![out])
    }
}

/// 不管输入是什么都输出同一个向量
pub struct FixedModel(pub Vec<f32>);

impl ReidModel for FixedModel {
    fn forward(&self, batch: ArrayView4<f32>) -> Result<Vec<Array2<f32>>> {
        let n = batch.len_of(Axis(0));
        let row = Array1::from(self.0.clone());
        let out = Array2::from_shape_fn((n, row.len()), |(_, j)| row[j]);
        Ok(vec![out])
    }
}

pub fn extractor(model: impl ReidModel + 'static) -> Arc<Extractor> {
    Arc::new(Extractor::new(Box::new(model), 4))
}

pub fn feature(raw: &[f32]) -> FeatureVector {
    FeatureVector::normalized(Array1::from(raw.to_vec()).view()).unwrap()
}

/// 与 `[1, 0, 0]` 的点积为 `score` 的单位向量
pub fn scored(score: f32) -> FeatureVector {
    feature(&[score, (1. - score * score).max(0.).sqrt(), 0.])
}

pub fn write_gallery(path: &Path, entries: &[(&str, FeatureVector)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut gallery = VideoGallery::new();
    for (key, feature) in entries {
        gallery.insert(key.to_string(), feature.clone()).unwrap();
    }
    gallery.save(path).unwrap();
}

pub fn write_image(path: &Path, rgb: [u8; 3]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(16, 48, Rgb(rgb)).save(path).unwrap();
}

/// 在 `<gallery_dir>/cropped` 下写入纯色裁剪图片
pub fn write_crops(gallery_dir: &Path, crops: &[(&str, [u8; 3])]) {
    let cropped = gallery_dir.join(CROPPED_DIR);
    for (name, rgb) in crops {
        write_image(&cropped.join(name), *rgb);
    }
}
