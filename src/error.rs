use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ReidError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ReidError {
    /// 图片无法读取或解码
    #[error("无法解码图片 {path}: {reason}")]
    Decode { path: String, reason: String },
    /// 视频目录下没有 cropped 目录
    #[error("裁剪图片目录不存在: {}", .0.display())]
    CropsMissing(PathBuf),
    /// 模型输出的原始特征范数为零或非有限值，无法归一化
    #[error("特征向量范数为零，无法归一化")]
    DegenerateFeature,
    #[error("模型推理失败: {0}")]
    Model(String),
    /// 查询与图库，或不同视频的图库之间特征维度不一致
    #[error("特征维度不一致: 期望 {expected}，实际 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("图库文件损坏 {}: {reason}", path.display())]
    GalleryCorrupt { path: PathBuf, reason: String },
    #[error("推理服务不可用: {0}")]
    InferenceUnavailable(#[from] InferenceFailure),
    #[error("无效输入: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 与推理服务交互失败的具体原因
#[derive(Debug, Error)]
pub enum InferenceFailure {
    #[error("请求超时（{0:?}）")]
    Timeout(std::time::Duration),
    #[error("连接失败: {0}")]
    Connection(String),
    /// 服务返回 `ok: false`
    #[error("请求被拒绝: {0}")]
    Rejected(String),
    #[error("响应格式错误: {0}")]
    Malformed(String),
}

impl ReidError {
    pub fn decode(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode { path: path.into(), reason: reason.to_string() }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::GalleryCorrupt { path: path.into(), reason: reason.to_string() }
    }
}
