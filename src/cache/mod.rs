//! Image cache
//!
//! Maps chain digests to the images built for them. Entries are only ever
//! added through a reject-on-overwrite insert, so a stored digest always
//! names the same image for as long as the entry exists.

mod image;
mod store;

pub use image::{ImageCache, ImageInfo};
pub use store::{load, save, StoredCache};

/// Default cache file name, relative to the config's base directory
pub const DEFAULT_CACHE_FILE: &str = "docker_image_cache.json";
