//! Asset cache: remote image URLs mapped to files on local disk.
//!
//! Files live under `<root>/<owner>/`, so purging an owner is one directory
//! removal. The URL to path mapping is persisted per owner in the key-value
//! store under `assets_<owner>_map`.

pub mod cache;
pub mod fetch;

pub use cache::{sanitized_file_name, AssetCache};
pub use fetch::{AssetFetcher, HttpFetcher};
