#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use easel_core::DrawingSurface;
use easel_core::FileStore;
use easel_core::GeneratedImageRecord;
use easel_core::KeyValueStore;
use easel_core::RasterSurface;
use easel_core::store::API_KEY_STORAGE_KEY;
use easel_core::store::save_images;

mod generate;
mod login;

pub(crate) const VALID_KEY: &str = "sk-or-12345678901234";

/// `easel` with its home pointed at `home` and colors off.
pub(crate) fn easel_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("easel").unwrap();
    cmd.env("EASEL_HOME", home)
        .env_remove("RUST_LOG")
        .arg("--color")
        .arg("never");
    cmd
}

pub(crate) fn store_key(home: &Path, api_key: &str) {
    let store = FileStore::open(home).unwrap();
    store.set(API_KEY_STORAGE_KEY, api_key).unwrap();
}

/// A small PNG as a data URI.
pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
    RasterSurface::new(width, height).export_data_uri().unwrap()
}

pub(crate) fn seed_images(home: &Path, prompts: &[&str]) -> Vec<GeneratedImageRecord> {
    let store = FileStore::open(home).unwrap();
    let records: Vec<GeneratedImageRecord> = prompts
        .iter()
        .map(|prompt| GeneratedImageRecord::new(png_data_uri(2, 2), prompt, png_data_uri(4, 4)))
        .collect();
    save_images(&store, &records).unwrap();
    records
}
