use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use log::{debug, info};

use crate::aggregate::{VideoSource, aggregate};
use crate::config::MediaRoot;
use crate::error::Result;
use crate::extractor::{Extractor, preprocess};
use crate::format::{QueryResult, VideoCatalog, VideoInfo, format_results};
use crate::metrics;
use crate::protocol::VideoRef;
use crate::rank::{RankOptions, check_dim, rank};

/// 行人搜索：提取查询特征，聚合案件图库，排序并格式化
pub struct ReidSearcher {
    extractor: Arc<Extractor>,
    media_root: MediaRoot,
}

impl ReidSearcher {
    pub fn new(extractor: Arc<Extractor>, media_root: MediaRoot) -> Self {
        Self { extractor, media_root }
    }

    pub fn extractor(&self) -> &Arc<Extractor> {
        &self.extractor
    }

    pub fn media_root(&self) -> &MediaRoot {
        &self.media_root
    }

    /// 根据视频列表生成图库来源与视频信息
    pub fn sources(&self, videos: &[VideoRef]) -> Result<(Vec<VideoSource>, HashMap<String, VideoInfo>)> {
        let mut sources = Vec::with_capacity(videos.len());
        let mut catalog = HashMap::new();
        for video in videos {
            sources.push(VideoSource {
                video_id: video.id.clone(),
                gallery_path: self.media_root.gallery_file(&video.path)?,
            });
            catalog.insert(
                video.id.to_string(),
                VideoInfo {
                    crop_dir: Some(MediaRoot::crop_dir_relative(&video.path)),
                    uri: Some(video.path.clone()),
                    ..Default::default()
                },
            );
        }
        Ok((sources, catalog))
    }

    /// 在给定视频中搜索查询图片
    ///
    /// 返回空列表表示没有匹配，任何失败都以错误返回
    pub fn search(
        &self,
        image: &DynamicImage,
        videos: &[VideoRef],
        opts: &RankOptions,
    ) -> Result<Vec<QueryResult>> {
        let (sources, catalog) = self.sources(videos)?;
        self.search_sources(image, &sources, &catalog, opts)
    }

    /// 搜索内存中的查询图片，解码失败直接返回错误
    pub fn search_image(&self, bytes: &[u8], videos: &[VideoRef], opts: &RankOptions) -> Result<Vec<QueryResult>> {
        let image = preprocess::imdecode(bytes)?;
        self.search(&image, videos, opts)
    }

    /// 搜索相对于媒体根目录的查询图片文件
    pub fn search_file(&self, query_img: &str, videos: &[VideoRef], opts: &RankOptions) -> Result<Vec<QueryResult>> {
        let image = preprocess::imread(&self.media_root.resolve(query_img)?)?;
        self.search(&image, videos, opts)
    }

    pub fn search_sources(
        &self,
        image: &DynamicImage,
        sources: &[VideoSource],
        catalog: &dyn VideoCatalog,
        opts: &RankOptions,
    ) -> Result<Vec<QueryResult>> {
        let start = Instant::now();

        let query = self.extractor.extract(image)?;
        debug!("查询特征提取耗时 {:.2}s", start.elapsed().as_secs_f32());

        let gallery = aggregate(sources)?;
        check_dim(&query, &gallery)?;
        let ranked = rank(&query, &gallery, opts);
        let best = ranked.first().and_then(|g| g.matches.first()).map(|m| m.similarity);
        let results = format_results(ranked, catalog);

        let elapsed = start.elapsed().as_secs_f32();
        metrics::observe_search(gallery.len(), best, elapsed);
        info!(
            "搜索完成: {} 个视频，{} 条图库记录，{} 个视频有匹配，耗时 {:.2}s",
            sources.len(),
            gallery.len(),
            results.len(),
            elapsed
        );
        Ok(results)
    }
}
