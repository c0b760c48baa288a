mod onnx;
pub mod preprocess;

use image::DynamicImage;
use ndarray::{Array2, Array3, ArrayView4, Axis};

pub use self::onnx::OnnxReidModel;
use crate::error::{ReidError, Result};
use crate::feature::FeatureVector;

/// ReID 特征提取模型
///
/// 输入为 `(N, 3, 384, 128)` 的标准化张量，输出一个或多个 `(N, D)` 的结果，
/// 多头模型会把辅助输出放在主特征之后，因此只使用第一个输出。
/// 实现必须可以通过 `&self` 并发调用。
pub trait ReidModel: Send + Sync {
    fn forward(&self, batch: ArrayView4<f32>) -> Result<Vec<Array2<f32>>>;
}

/// 特征提取器：预处理 + 推理 + 归一化
pub struct Extractor {
    model: Box<dyn ReidModel>,
    batch_size: usize,
}

impl Extractor {
    pub fn new(model: Box<dyn ReidModel>, batch_size: usize) -> Self {
        Self { model, batch_size: batch_size.max(1) }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 提取单张图片的特征
    pub fn extract(&self, image: &DynamicImage) -> Result<FeatureVector> {
        let tensor = preprocess::to_tensor(image);
        let mut features = self.extract_tensors(&[tensor])?;
        features.pop().ok_or_else(|| ReidError::Model("模型没有输出".to_string()))?
    }

    /// 对已经预处理的张量批量提取特征，按 `batch_size` 分批推理
    ///
    /// 返回值与输入一一对应，某一行无法归一化时对应位置为错误
    pub fn extract_tensors(&self, tensors: &[Array3<f32>]) -> Result<Vec<Result<FeatureVector>>> {
        let mut features = Vec::with_capacity(tensors.len());
        for chunk in tensors.chunks(self.batch_size) {
            let batch = preprocess::stack(chunk)?;
            let output = self.forward_primary(batch.view())?;
            features.extend(output.axis_iter(Axis(0)).map(FeatureVector::normalized));
        }
        Ok(features)
    }

    fn forward_primary(&self, batch: ArrayView4<f32>) -> Result<Array2<f32>> {
        let n = batch.len_of(Axis(0));
        let primary = self
            .model
            .forward(batch)?
            .into_iter()
            .next()
            .ok_or_else(|| ReidError::Model("模型没有输出".to_string()))?;
        if primary.nrows() != n {
            return Err(ReidError::Model(format!(
                "模型输出行数 {} 与批次大小 {} 不一致",
                primary.nrows(),
                n
            )));
        }
        Ok(primary)
    }
}
