use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::{Array3, Array4, ArrayView3, Axis};

use crate::error::{ReidError, Result};

/// 模型输入高度
pub const INPUT_HEIGHT: u32 = 384;
/// 模型输入宽度
pub const INPUT_WIDTH: u32 = 128;

// 以下常量属于模型训练时的约定，不能脱离模型单独修改
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 读取并解码图片文件
pub fn imread(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| ReidError::decode(path.display().to_string(), e))
}

/// 从内存解码图片
pub fn imdecode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| ReidError::decode("<memory>", e))
}

/// 缩放到 384x128，转为 CHW 布局并按通道标准化
pub fn to_tensor(image: &DynamicImage) -> Array3<f32> {
    let resized = image
        .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::CatmullRom)
        .to_rgb8();

    let (h, w) = (INPUT_HEIGHT as usize, INPUT_WIDTH as usize);
    let mut tensor = Array3::<f32>::zeros((3, h, w));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.;
            tensor[[c, y as usize, x as usize]] = (value - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
        }
    }
    tensor
}

/// 将多张 CHW 张量堆叠为 NCHW 批次
pub fn stack(tensors: &[Array3<f32>]) -> Result<Array4<f32>> {
    let views = tensors.iter().map(|t| t.view()).collect::<Vec<ArrayView3<f32>>>();
    ndarray::stack(Axis(0), &views).map_err(|e| ReidError::Model(e.to_string()))
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn test_to_tensor_shape_and_normalization() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 200, Rgb([255, 0, 128])));
        let tensor = to_tensor(&img);
        assert_eq!(tensor.shape(), &[3, 384, 128]);

        let r = (1. - CHANNEL_MEAN[0]) / CHANNEL_STD[0];
        let g = (0. - CHANNEL_MEAN[1]) / CHANNEL_STD[1];
        assert!((tensor[[0, 10, 10]] - r).abs() < 1e-3);
        assert!((tensor[[1, 200, 100]] - g).abs() < 1e-3);
    }

    #[test]
    fn test_stack() {
        let a = Array3::<f32>::zeros((3, 4, 2));
        let b = Array3::<f32>::ones((3, 4, 2));
        let batch = stack(&[a, b]).unwrap();
        assert_eq!(batch.shape(), &[2, 3, 4, 2]);
        assert_eq!(batch[[1, 2, 3, 1]], 1.);
    }

    #[test]
    fn test_imdecode_garbage() {
        let err = imdecode(b"not an image").unwrap_err();
        assert!(matches!(err, ReidError::Decode { .. }));
    }
}
