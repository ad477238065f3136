//! Service settings read from the environment.

use renderer::DEFAULT_JPEG_QUALITY;
use std::env;
use std::str::FromStr;
use tracing::warn;

/// One year, the lifetime advertised for cached tiles.
pub const DEFAULT_TILE_EXPIRES_SECS: u64 = 31_536_000;

pub const DEFAULT_SCRATCH_EXPIRES_SECS: u64 = 3600;

pub const DEFAULT_MAX_CUTOUT_SIZE: usize = 512;

pub const DEFAULT_BLANK_TILE_URL: &str = "/static/blank.jpg";

/// Runtime settings shared by all handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    /// Global switch for the persistent tile cache.
    pub save_cache: bool,
    pub jpeg_quality: u8,
    /// Redirect target for tiles without coverage.
    pub blank_tile_url: String,
    pub tile_expires_secs: u64,
    /// Lifetime advertised for renders that were not cached.
    pub scratch_expires_secs: u64,
    pub max_cutout_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            save_cache: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            blank_tile_url: DEFAULT_BLANK_TILE_URL.to_string(),
            tile_expires_secs: DEFAULT_TILE_EXPIRES_SECS,
            scratch_expires_secs: DEFAULT_SCRATCH_EXPIRES_SECS,
            max_cutout_size: DEFAULT_MAX_CUTOUT_SIZE,
        }
    }
}

impl ServiceSettings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or unparsable values keep
    /// their defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            save_cache: lookup("SAVE_CACHE")
                .map(|v| parse_bool(&v, defaults.save_cache))
                .unwrap_or(defaults.save_cache),
            jpeg_quality: parse_var(&lookup, "JPEG_QUALITY", defaults.jpeg_quality).min(100),
            blank_tile_url: lookup("BLANK_TILE_URL").unwrap_or(defaults.blank_tile_url),
            tile_expires_secs: parse_var(&lookup, "TILE_EXPIRES_SECS", defaults.tile_expires_secs),
            scratch_expires_secs: parse_var(&lookup, "SCRATCH_EXPIRES_SECS", defaults.scratch_expires_secs),
            max_cutout_size: parse_var(&lookup, "MAX_CUTOUT_SIZE", defaults.max_cutout_size),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable setting");
            default
        }),
        None => default,
    }
}

fn parse_bool(raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
