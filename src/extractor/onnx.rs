use std::path::Path;

use log::info;
use ndarray::{Array2, Array4, ArrayView4, Axis, s};
use tract_onnx::prelude::*;

use super::ReidModel;
use super::preprocess::{INPUT_HEIGHT, INPUT_WIDTH};
use crate::error::{ReidError, Result};

type Plan = TypedRunnableModel<TypedModel>;

/// 基于 tract 的 ONNX 模型
///
/// 模型以固定的输入形状 `[batch, 3, 384, 128]` 加载，不足一个批次时用零补齐，
/// 补齐部分的输出会被丢弃。单张图片（查询）使用单独的 `[1, 3, 384, 128]` 计划，不做补齐
pub struct OnnxReidModel {
    plan: Plan,
    single: Option<Plan>,
    batch: usize,
}

fn compile(path: &Path, batch: usize) -> Result<Plan> {
    let shape = [batch, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize];
    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|model| model.with_input_fact(0, f32::fact(shape).into()))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|e| ReidError::Model(format!("加载模型失败: {e}")))
}

/// `n` 张图片使用的计划批次大小
fn plan_batch(n: usize, batch: usize) -> usize {
    if n == 1 { 1 } else { batch }
}

/// 把模型输出转换为 `(n, D)` 矩阵，丢弃补齐部分
fn collect_heads(
    outputs: impl IntoIterator<Item = TValue>,
    n: usize,
) -> TractResult<Vec<Array2<f32>>> {
    let mut heads = vec![];
    for output in outputs {
        let shape = output.shape();
        anyhow::ensure!(!shape.is_empty(), "模型输出是标量，无法作为特征");
        anyhow::ensure!(shape[0] >= n, "模型输出行数 {} 少于输入 {}", shape[0], n);
        let dim = shape.iter().skip(1).product::<usize>();
        let data = output.as_slice::<f32>()?;
        let full = Array2::from_shape_vec((shape[0], dim), data.to_vec())?;
        heads.push(full.slice(s![..n, ..]).to_owned());
    }
    Ok(heads)
}

impl OnnxReidModel {
    pub fn load(path: &Path, batch: usize) -> Result<Self> {
        let batch = batch.max(1);
        info!("加载 ReID 模型: {}, batch = {}", path.display(), batch);
        let plan = compile(path, batch)?;
        let single = if batch > 1 { Some(compile(path, 1)?) } else { None };
        Ok(Self { plan, single, batch })
    }

    fn run_padded(&self, batch: ArrayView4<f32>) -> TractResult<Vec<Array2<f32>>> {
        let n = batch.len_of(Axis(0));
        let size = plan_batch(n, self.batch);
        let plan = match (&self.single, size) {
            (Some(single), 1) => single,
            _ => &self.plan,
        };

        let mut padded = Array4::<f32>::zeros((size, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));
        padded.slice_mut(s![..n, .., .., ..]).assign(&batch);

        let input = Tensor::from_shape(padded.shape(), padded.as_slice().unwrap_or_default())?;
        let outputs = plan.run(tvec!(input.into()))?;
        collect_heads(outputs, n)
    }
}

impl ReidModel for OnnxReidModel {
    fn forward(&self, batch: ArrayView4<f32>) -> Result<Vec<Array2<f32>>> {
        let n = batch.len_of(Axis(0));
        if n > self.batch {
            return Err(ReidError::Model(format!("批次大小 {n} 超过模型输入 {}", self.batch)));
        }
        self.run_padded(batch).map_err(|e| ReidError::Model(e.to_string()))
    }
}
