use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("reid_search_duration", "duration of the per-query search in seconds")
        .unwrap()
});

static METRIC_SEARCH_BEST_SCORE: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "reid_search_best_score",
        "best similarity of the per-query search",
        (-10..=10).map(|x| x as f64 / 10.).collect()
    )
    .unwrap()
});

static METRIC_SEARCH_GALLERY_SIZE: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "reid_search_gallery_size",
        "number of gallery entries scanned per query",
        exponential_buckets(16., 4., 8).unwrap()
    )
    .unwrap()
});

static METRIC_SEARCH_EMPTY_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("reid_search_empty_count", "count of queries without any match").unwrap()
});

static METRIC_GALLERY_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "reid_gallery_build_duration",
        "duration of the per-video gallery build in seconds",
        exponential_buckets(1., 2., 12).unwrap()
    )
    .unwrap()
});

static METRIC_GALLERY_CROPS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("reid_gallery_crops", "count of the processed crops", &["status"])
        .unwrap()
});

/// 记录一次搜索
pub fn observe_search(gallery_size: usize, best_score: Option<f32>, duration: f32) {
    METRIC_SEARCH_DURATION.observe(duration as f64);
    METRIC_SEARCH_GALLERY_SIZE.observe(gallery_size as f64);
    match best_score {
        Some(score) => METRIC_SEARCH_BEST_SCORE.observe(score as f64),
        None => METRIC_SEARCH_EMPTY_COUNT.inc(),
    }
}

/// 记录一次图库构建
pub fn observe_gallery_build(entries: usize, skipped: usize, duration: f32) {
    METRIC_GALLERY_BUILD_DURATION.observe(duration as f64);
    METRIC_GALLERY_CROPS.with_label_values(&["ok"]).inc_by(entries as u64);
    METRIC_GALLERY_CROPS.with_label_values(&["skipped"]).inc_by(skipped as u64);
}

/// 以文本格式导出所有指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&prometheus::gather()).unwrap_or_else(|e| format!("# {e}\n"))
}
