use std::{env, time::Duration};

use anyhow::{bail, Context, Result};
use common::req::BucketWidth;
use dotenvy::dotenv;

const DEFAULT_DATABASE_URL: &str = "sensor_data.db";
const DEFAULT_HTTP_BIND: &str = "0.0.0.0:6660";
const DEFAULT_READ_POOL_SIZE: u32 = 4;
const DEFAULT_WINDOW_MINUTES: u64 = 24 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    /// Trailing window applied regardless of bucket width.
    pub window: Duration,
    pub bucket_widths: Vec<BucketWidth>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_MINUTES * 60),
            bucket_widths: vec![BucketWidth::Minute, BucketWidth::Hour],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub http_bind: String,
    pub udp_bind: Option<String>,
    pub read_pool_size: u32,
    pub cors_origin: Option<String>,
    pub aggregation: AggregationConfig,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read_pool_size = match lookup("READ_POOL_SIZE") {
            Some(value) => value
                .parse::<u32>()
                .with_context(|| format!("READ_POOL_SIZE must be an integer, got '{value}'"))?,
            None => DEFAULT_READ_POOL_SIZE,
        };
        if read_pool_size == 0 {
            bail!("READ_POOL_SIZE must be at least 1");
        }

        let window_minutes = match lookup("AGGREGATION_WINDOW_MINUTES") {
            Some(value) => value.parse::<u64>().with_context(|| {
                format!("AGGREGATION_WINDOW_MINUTES must be an integer, got '{value}'")
            })?,
            None => DEFAULT_WINDOW_MINUTES,
        };
        if window_minutes == 0 {
            bail!("AGGREGATION_WINDOW_MINUTES must be at least 1");
        }

        let window_secs = window_minutes.checked_mul(60).with_context(|| {
            format!("AGGREGATION_WINDOW_MINUTES is out of range, got {window_minutes}")
        })?;

        let bucket_widths = match lookup("AGGREGATION_BUCKETS") {
            Some(value) => parse_widths(&value)?,
            None => AggregationConfig::default().bucket_widths,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            http_bind: lookup("HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_owned()),
            udp_bind: lookup("UDP_BIND").filter(|v| !v.is_empty()),
            read_pool_size,
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.is_empty()),
            aggregation: AggregationConfig {
                window: Duration::from_secs(window_secs),
                bucket_widths,
            },
        })
    }
}

fn parse_widths(value: &str) -> Result<Vec<BucketWidth>> {
    let mut widths = Vec::new();
    for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let width = BucketWidth::from_name(name)
            .with_context(|| format!("AGGREGATION_BUCKETS: unknown bucket width '{name}'"))?;
        if !widths.contains(&width) {
            widths.push(width);
        }
    }
    if widths.is_empty() {
        bail!("AGGREGATION_BUCKETS must name at least one bucket width");
    }
    Ok(widths)
}
