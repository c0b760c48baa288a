use ndarray::{Array1, ArrayView1};

use crate::error::{ReidError, Result};

/// L2 归一化后的特征向量，创建后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f32>);

impl FeatureVector {
    /// 对原始特征做 L2 归一化
    ///
    /// 范数为零或不是有限值时返回 [`ReidError::DegenerateFeature`]
    pub fn normalized(raw: ArrayView1<f32>) -> Result<Self> {
        let norm = raw.dot(&raw).sqrt();
        if norm == 0. || !norm.is_finite() {
            return Err(ReidError::DegenerateFeature);
        }
        Ok(Self(raw.mapv(|x| x / norm)))
    }

    /// 直接使用已经归一化的数据，仅用于从图库文件加载
    pub(crate) fn from_normalized(data: Vec<f32>) -> Self {
        Self(Array1::from(data))
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }

    pub fn as_slice(&self) -> &[f32] {
        // Array1 由 Vec 或 mapv 构造，总是标准布局
        self.0.as_slice().expect("feature vector is contiguous")
    }

    /// 欧几里得范数
    pub fn norm(&self) -> f32 {
        self.0.dot(&self.0).sqrt()
    }

    /// 两个单位向量的点积，即余弦相似度
    pub fn dot(&self, other: &FeatureVector) -> f32 {
        self.0.dot(&other.0)
    }
}
