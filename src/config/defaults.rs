//! Built-in configuration defaults

use std::path::PathBuf;
use std::thread;

use crate::cache::DEFAULT_CACHE_ROOT;
use crate::driver::DEFAULT_DPI;

/// Compiler timeout in seconds (0 disables the timeout)
pub const DEFAULT_COMPILER_TIMEOUT_SECONDS: u64 = 120;

/// Image URL prefix used when rewriting documents
pub const DEFAULT_IMAGE_BASE_URL: &str = "images";

/// Project config file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "latex2image.toml";

pub const MAX_DPI: u32 = 2400;

pub(super) fn cache_root() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_ROOT)
}

pub(super) fn dpi() -> u32 {
    DEFAULT_DPI
}

pub(super) fn compiler_timeout_seconds() -> u64 {
    DEFAULT_COMPILER_TIMEOUT_SECONDS
}

pub(super) fn workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

pub(super) fn image_base_url() -> String {
    DEFAULT_IMAGE_BASE_URL.to_string()
}
