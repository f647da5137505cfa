//! Build script for the web crate.
//!
//! Hashes the static stylesheet and scripts so templates can append a
//! content-based version to asset URLs.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Assets whose content goes into `ASSET_HASH`, relative to the crate root.
const ASSETS: [&str; 4] = [
    "static/css/main.css",
    "static/js/typeahead.js",
    "static/js/map.js",
    "static/js/heart.js",
];

fn main() {
    hash_assets();
}

/// Hash every asset in [`ASSETS`] together.
///
/// Sets `ASSET_HASH` for use with `env!("ASSET_HASH")`. Missing files are
/// skipped with a warning.
fn hash_assets() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");

    let mut hasher = Sha256::new();
    for asset in ASSETS {
        let path = Path::new(&manifest_dir).join(asset);
        println!("cargo:rerun-if-changed={}", path.display());

        match fs::read(&path) {
            Ok(content) => hasher.update(&content),
            Err(e) => println!("cargo:warning=Could not read {asset}: {e}"),
        }
    }

    // First 8 chars of the SHA256
    let hash = format!("{:x}", hasher.finalize());
    let short_hash = hash.get(..8).unwrap_or(&hash);

    println!("cargo:rustc-env=ASSET_HASH={short_hash}");
}
