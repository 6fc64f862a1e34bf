//! # geolocator
//!
//! Reverse-geocode the GPS position stored in photos and write the place names
//! (country, state, city, neighborhood) back into their IPTC metadata.
//!
//! Metadata is read and written through [exiftool](https://exiftool.org); place
//! names come from either the Google Geocoding API or an offline gazetteer.
//!
//! ## Quick Start
//!
//! The [`coordinator`] runs the whole open → reverse geocode → write flow:
//!
//! ```rust,no_run
//! use geolocator::config::Config;
//! use geolocator::coordinator::Coordinator;
//! use geolocator::progress::BatchControl;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load config from file (geocoder choice, API key, exiftool path, ...)
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let mut coordinator = Coordinator::from_config(&config)?;
//!
//!     // Files, directories, and memory cards (DCIM/100CANON/...) are all accepted
//!     coordinator.open(&[PathBuf::from("./photos")]).await?;
//!
//!     let control = BatchControl::new();
//!     let summary = coordinator
//!         .reverse_geocode(&control, |p| println!("[{}/{}] {}", p.completed, p.total, p.message))
//!         .await?;
//!     println!("Resolved {} of {}", summary.resolved, summary.total);
//!
//!     let written = coordinator.write_images().await?;
//!     println!("Wrote {} file(s), {} failed", written.written, written.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The pieces can be used on their own: collect files, read them into a
//! [`MetadataStore`](metadata::MetadataStore), geocode single records.
//!
//! ```rust,no_run
//! use geolocator::collector::collect;
//! use geolocator::geocoder::{GoogleGeocoder, ReverseGeocoder};
//! use geolocator::metadata::{ExifTool, MetadataStore};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let files = collect(&[PathBuf::from("img1.jpg")])?;
//!
//!     let mut store = MetadataStore::new(Box::new(ExifTool::new("exiftool", true)));
//!     store.read(None, &files).await?;
//!
//!     let geocoder = GoogleGeocoder::new("AIza...".into());
//!     for image in store.images_mut() {
//!         let completion = geocoder.reverse_geocode(image).await;
//!         println!("{completion}");
//!     }
//!
//!     store.write_staged(store.images()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`collector`]: Turn user paths into a list of image files (DCIM aware)
//! - [`config`]: Configuration types and loading/saving
//! - [`coordinator`]: The open / reverse geocode / write state machine
//! - [`error`]: Error types
//! - [`geocoder`]: Reverse-geocoding trait and providers (Google, offline gazetteer)
//! - [`gps`]: GPS reference direction and fix status
//! - [`metadata`]: Typed metadata access and exiftool integration
//! - [`progress`]: Progress reports and batch cancel/pause/resume
//! - [`record`]: The per-image record and its place fields

pub mod collector;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geocoder;
pub mod gps;
pub mod metadata;
pub mod progress;
pub mod record;
