use indicatif::ProgressStyle;

use crate::error::{ReidError, Result};
use crate::protocol::VideoRef;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ETA {eta_precise} {msg}",
    )
    .expect("failed to build progress style")
    .progress_chars("##-")
}

/// 解析 `ID=PATH` 格式的视频参数
pub fn parse_video_arg(s: &str) -> Result<VideoRef> {
    let (id, path) = s
        .split_once('=')
        .ok_or_else(|| ReidError::InvalidInput(format!("视频参数格式应为 ID=PATH: {s}")))?;
    if path.is_empty() {
        return Err(ReidError::InvalidInput(format!("视频路径不能为空: {s}")));
    }
    Ok(VideoRef { id: id.parse()?, path: path.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_arg() {
        let video = parse_video_arg("12=data/case/1/video/12/a.mp4").unwrap();
        assert_eq!(video.id.as_str(), "12");
        assert_eq!(video.path, "data/case/1/video/12/a.mp4");

        assert!(parse_video_arg("12").is_err());
        assert!(parse_video_arg("12=").is_err());
        assert!(parse_video_arg("=a.mp4").is_err());
    }
}
