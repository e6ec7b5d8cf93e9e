use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, TextEncoder, opts, register_int_counter};

pub static SEARCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pncp_tracker_searches_total",
        "Total number of search requests served"
    ))
    .unwrap()
});

pub static UPSTREAM_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pncp_tracker_upstream_requests_total",
        "Total number of requests issued to the procurement registry"
    ))
    .unwrap()
});

pub static CONTRACT_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pncp_tracker_contract_cache_hits_total",
        "Detail lookups answered from the local contract cache"
    ))
    .unwrap()
});

pub static CONTRACT_CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pncp_tracker_contract_cache_misses_total",
        "Detail lookups that had to fetch from the registry"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
