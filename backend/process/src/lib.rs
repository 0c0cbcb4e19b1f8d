//! # Image Import
//!
//! Fills the rating store from a directory of images.
//!
//! ## Steps
//! 1. Walk the directory (optionally recursive), keep files with a known image extension.
//!
//! 2. Sort the paths so ids are handed out in a stable order across runs.
//!
//! 3. Locator is the base url plus the path relative to the directory, always `/` separated.
//!    Name is the sanitized file stem, falling back to the raw stem when nothing survives.
//!
//! 4. Insert each image at the default rating. The store skips locators it already has, so
//!    running the import again only adds new files and never resets ratings.
//!
//! ## Notes
//! - Serving the files and keeping resolved paths inside the image root is the web server's job,
//!   not ours.
use std::path::Path;

use anyhow::Context;
use gallery::{NewImage, RatingStore};
use indicatif::{ProgressBar, ProgressStyle};

pub mod models;
pub mod utils;

use models::ImportReport;
use utils::{collect_images, to_asset};

pub async fn load_images(
    store: &dyn RatingStore,
    dir: &Path,
    base_url: &str,
    recursive: bool,
) -> anyhow::Result<ImportReport> {
    let paths = collect_images(dir, recursive)
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    println!("Found Images: {}", paths.len());
    println!("Stored Images: {}\n", store.count().await?);

    let mut report = ImportReport {
        found: paths.len(),
        ..ImportReport::default()
    };

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    for path in paths {
        let asset = to_asset(base_url, dir, &path);
        pb.set_message(asset.name.clone());

        match store
            .insert(NewImage::new(asset.name, asset.locator.clone()))
            .await
            .with_context(|| format!("Failed to insert {}", asset.locator))?
        {
            Some(_) => report.inserted += 1,
            None => {
                #[cfg(feature = "verbose")]
                println!("Duplicate! {}", asset.locator);

                report.skipped += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    if report.inserted == 0 {
        println!("No new images found. Exiting.");
    } else {
        println!("Total New Images: {}", report.inserted);
        println!("Skipped Duplicates: {}\n", report.skipped);

        println!("Image Verification: {}", store.count().await?);
    }

    Ok(report)
}
