use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::ReidSearcher;
use crate::gallery::GalleryBuilder;
use crate::rank::RankOptions;

/// 应用状态
pub struct AppState {
    /// 行人搜索
    pub searcher: ReidSearcher,
    /// 图库构建
    pub builder: GalleryBuilder,
    /// 默认搜索参数
    pub search: RankOptions,
    /// 限制同时构建的图库数量
    pub build_limit: Semaphore,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(searcher: ReidSearcher, search: RankOptions, token: String) -> Arc<Self> {
        let builder = GalleryBuilder::new(searcher.extractor().clone());
        Arc::new(AppState {
            searcher,
            builder,
            search,
            build_limit: Semaphore::new(num_cpus::get().max(1)),
            token,
        })
    }
}
