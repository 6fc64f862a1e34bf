//! The run coordinator: open a batch, reverse geocode it, write it back.
//!
//! [`Coordinator`] owns the working set for one run and moves through
//! [`State`]s as operations start and finish:
//!
//! ```text
//! Idle ──open──▶ Reading ──▶ Ready ──reverse_geocode──▶ Geocoding ──▶ Ready
//!                              │
//!                              └──write_images──▶ Writing ──▶ Idle
//! ```
//!
//! A failed or dropped operation returns to the state it started from and leaves the
//! working set as it was.

use futures::{StreamExt, stream};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::collector;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::geocoder::{self, Completion, ReverseGeocoder};
use crate::metadata::{ExifTool, MetadataStore, TagKey, WriteSummary, tags};
use crate::progress::{BatchControl, Progress};
use crate::record::ImageRecord;

/// Tags read when opening a batch: everything a record is built from.
pub const REQUIRED_TAGS: &[TagKey] = &[
    tags::FILE_NAME,
    tags::DATE_TIME_ORIGINAL,
    tags::GPS_LATITUDE,
    tags::GPS_LATITUDE_REF,
    tags::GPS_LONGITUDE,
    tags::GPS_LONGITUDE_REF,
    tags::COMPOSITE_LATITUDE,
    tags::COMPOSITE_LONGITUDE,
    tags::GPS_STATUS,
    tags::COUNTRY,
    tags::STATE,
    tags::CITY,
    tags::NEIGHBORHOOD,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum State {
    Idle,
    Reading,
    Ready,
    Geocoding,
    Writing,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Reading => "reading",
            Self::Ready => "ready",
            Self::Geocoding => "geocoding",
            Self::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// Tally of one reverse-geocode batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeocodeSummary {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl GeocodeSummary {
    pub fn completed(&self) -> usize {
        self.resolved + self.skipped + self.failed + self.cancelled
    }

    fn count(&mut self, completion: &Completion) {
        match completion {
            Completion::Resolved { .. } => self.resolved += 1,
            Completion::Skipped { .. } => self.skipped += 1,
            Completion::Failed { .. } => self.failed += 1,
            Completion::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

/// Sole owner of one run's working set.
///
/// # Example
///
/// ```rust,no_run
/// use geolocator::config::Config;
/// use geolocator::coordinator::Coordinator;
/// use geolocator::progress::BatchControl;
/// use std::path::PathBuf;
///
/// # async fn example() -> geolocator::error::Result<()> {
/// let mut coordinator = Coordinator::from_config(&Config::default())?;
/// coordinator.open(&[PathBuf::from("/Volumes/CARD")]).await?;
///
/// let control = BatchControl::new();
/// coordinator
///     .reverse_geocode(&control, |p| println!("{}/{} {}", p.completed, p.total, p.message))
///     .await?;
/// coordinator.write_images().await?;
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    store: MetadataStore,
    geocoder: Box<dyn ReverseGeocoder>,
    state: State,
    concurrency: usize,
    staged_write: bool,
}

impl Coordinator {
    pub fn new(store: MetadataStore, geocoder: Box<dyn ReverseGeocoder>) -> Self {
        Self {
            store,
            geocoder,
            state: State::Idle,
            concurrency: 1,
            staged_write: true,
        }
    }

    /// Build a coordinator with exiftool and the configured geocoder.
    pub fn from_config(config: &Config) -> Result<Self> {
        let tool = ExifTool::new(&config.exiftool.path, config.output.keep_backups);
        let store = MetadataStore::new(Box::new(tool)).with_dry_run(config.output.dry_run);
        let geocoder =
            geocoder::build_geocoder(config).map_err(|e| Error::Config(format!("{e:#}")))?;
        log::info!("Using the {} geocoder", geocoder.name());

        Ok(Self::new(store, geocoder)
            .with_concurrency(config.geocoder.concurrency)
            .with_staged_write(config.output.staged_write))
    }

    /// Maximum lookups in flight during [`reverse_geocode`](Self::reverse_geocode).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_staged_write(mut self, staged_write: bool) -> Self {
        self.staged_write = staged_write;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn images(&self) -> &[ImageRecord] {
        self.store.images()
    }

    pub fn geocoder(&self) -> &dyn ReverseGeocoder {
        self.geocoder.as_ref()
    }

    fn ensure(&self, allowed: &[State], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::NotReady {
                state: self.state,
                operation,
            })
        }
    }

    /// Collect `paths` and read their metadata into a new working set.
    ///
    /// Returns the number of images loaded. On error the previous working set
    /// and state are kept.
    pub async fn open(&mut self, paths: &[PathBuf]) -> Result<usize> {
        self.ensure(&[State::Idle, State::Ready], "open")?;
        let state = Transition::enter(&mut self.state, State::Reading);

        let result = match collector::collect(paths) {
            Ok(files) => self.store.read(Some(REQUIRED_TAGS), &files).await,
            Err(e) => Err(e),
        };

        if result.is_ok() {
            state.finish(State::Ready);
        }
        result
    }

    /// Reverse geocode every record in the working set.
    ///
    /// `on_progress` is called once per record as its lookup completes, in
    /// completion order; the last call reports `completed == total`. An empty
    /// working set completes without any call. Records not yet started when
    /// `control` is cancelled complete as cancelled.
    pub async fn reverse_geocode(
        &mut self,
        control: &BatchControl,
        mut on_progress: impl FnMut(&Progress),
    ) -> Result<GeocodeSummary> {
        self.ensure(&[State::Ready], "reverse geocode")?;
        let Self {
            store,
            geocoder,
            state,
            concurrency,
            ..
        } = self;
        let state = Transition::enter(state, State::Geocoding);

        let total = store.images().len();
        let mut summary = GeocodeSummary {
            total,
            ..Default::default()
        };
        log::info!(
            "Reverse geocoding {total} image(s) with {} (up to {} at a time)",
            geocoder.name(),
            concurrency
        );

        let geocoder: &dyn ReverseGeocoder = &**geocoder;
        let mut completions = stream::iter(store.images_mut().iter_mut())
            .map(move |record| async move {
                control.proceed().await;
                if control.is_cancelled() {
                    return Completion::Cancelled {
                        file: record.file_name(),
                    };
                }
                geocoder.reverse_geocode(record).await
            })
            .buffer_unordered(*concurrency);

        while let Some(completion) = completions.next().await {
            summary.count(&completion);
            let progress = Progress {
                completed: summary.completed(),
                total,
                message: completion.message(),
            };
            log::debug!("[{}/{}] {}", progress.completed, progress.total, progress.message);
            on_progress(&progress);
        }
        drop(completions);

        log::info!(
            "Geocoding finished: {} resolved, {} skipped, {} failed, {} cancelled",
            summary.resolved,
            summary.skipped,
            summary.failed,
            summary.cancelled
        );
        state.finish(State::Ready);
        Ok(summary)
    }

    /// Write the working set's place fields back to the files.
    ///
    /// The working set stays available afterwards; a new batch starts with
    /// [`open`](Self::open).
    pub async fn write_images(&mut self) -> Result<WriteSummary> {
        self.ensure(&[State::Ready], "write")?;
        let state = Transition::enter(&mut self.state, State::Writing);

        let images = self.store.images();
        let result = if self.staged_write {
            self.store.write_staged(images).await
        } else {
            self.store.write(images).await
        };

        if result.is_ok() {
            state.finish(State::Idle);
        }
        result
    }
}

/// A coordinator state held for the length of one operation.
///
/// Unless [`finish`](Transition::finish) names the next state, dropping the
/// transition restores the state the operation started from. That covers
/// errors as well as a caller dropping the operation's future part way.
struct Transition<'a> {
    state: &'a mut State,
    next: State,
}

impl<'a> Transition<'a> {
    fn enter(state: &'a mut State, busy: State) -> Self {
        let next = std::mem::replace(state, busy);
        Self { state, next }
    }

    fn finish(mut self, next: State) {
        self.next = next;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        *self.state = self.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::stub::StubGeocoder;
    use crate::metadata::fake::{FakeTool, Shared};
    use crate::record::GeoPlace;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Lets a test count provider calls after boxing the stub into the coordinator.
    struct SharedGeocoder(Arc<StubGeocoder>);

    #[async_trait::async_trait]
    impl ReverseGeocoder for SharedGeocoder {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn show_activity_count(&self) -> usize {
            self.0.show_activity_count()
        }
        async fn lookup(
            &self,
            latitude: f64,
            longitude: f64,
        ) -> std::result::Result<GeoPlace, crate::error::GeocodeError> {
            self.0.lookup(latitude, longitude).await
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        tool: Arc<FakeTool>,
        geocoder: Arc<StubGeocoder>,
    }

    /// Create `names` as real files (so the collector finds them) and register
    /// their metadata with the fake tool.
    fn fixture(names: &[(&str, &str)], geocoder: StubGeocoder) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let mut tool = FakeTool::default();
        for (name, status) in names {
            let path = root.join(name);
            std::fs::write(&path, b"jpeg").unwrap();
            tool = tool.with_file(
                path.to_str().unwrap(),
                serde_json::json!({
                    "File": { "FileName": name },
                    "EXIF": {
                        "GPSLatitude": 37.7749, "GPSLatitudeRef": "N",
                        "GPSLongitude": 122.4194, "GPSLongitudeRef": "W",
                        "GPSStatus": status
                    }
                }),
            );
        }
        Fixture {
            _dir: dir,
            root,
            tool: Arc::new(tool),
            geocoder: Arc::new(geocoder),
        }
    }

    impl Fixture {
        fn coordinator(&self) -> Coordinator {
            Coordinator::new(
                MetadataStore::new(Box::new(Shared(self.tool.clone()))),
                Box::new(SharedGeocoder(self.geocoder.clone())),
            )
        }
    }

    fn usa_san_francisco() -> StubGeocoder {
        StubGeocoder::returning(GeoPlace {
            country: Some("USA".into()),
            city: Some("San Francisco".into()),
            ..Default::default()
        })
    }

    // ── state machine ─────────────────────────────────────────────────

    #[tokio::test]
    async fn operations_require_ready() {
        let f = fixture(&[("img1.jpg", "A")], usa_san_francisco());
        let mut coordinator = f.coordinator();
        assert_eq!(coordinator.state(), State::Idle);

        let control = BatchControl::new();
        assert!(matches!(
            coordinator.reverse_geocode(&control, |_| {}).await,
            Err(Error::NotReady { state: State::Idle, .. })
        ));
        assert!(matches!(
            coordinator.write_images().await,
            Err(Error::NotReady { state: State::Idle, .. })
        ));

        coordinator.open(&[f.root.clone()]).await.unwrap();
        assert_eq!(coordinator.state(), State::Ready);
        coordinator.reverse_geocode(&control, |_| {}).await.unwrap();
        assert_eq!(coordinator.state(), State::Ready);
        coordinator.write_images().await.unwrap();
        assert_eq!(coordinator.state(), State::Idle);
        assert_eq!(coordinator.images().len(), 1);
    }

    #[tokio::test]
    async fn failed_open_keeps_working_set() {
        let f = fixture(&[("img1.jpg", "A")], usa_san_francisco());
        let mut coordinator = f.coordinator();
        coordinator.open(&[f.root.clone()]).await.unwrap();

        let result = coordinator.open(&[f.root.join("missing")]).await;
        assert!(matches!(result, Err(Error::Io { .. })));
        assert_eq!(coordinator.state(), State::Ready);
        assert_eq!(coordinator.images().len(), 1);
    }

    // ── reverse_geocode ───────────────────────────────────────────────

    #[tokio::test]
    async fn san_francisco_scenario() {
        let f = fixture(&[("img1.jpg", "A")], usa_san_francisco());
        let mut coordinator = f.coordinator();
        coordinator.open(&[f.root.join("img1.jpg")]).await.unwrap();

        let record = &coordinator.images()[0];
        assert_eq!(record.coordinates(), Some((37.7749, -122.4194)));

        let summary = coordinator
            .reverse_geocode(&BatchControl::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(summary.resolved, 1);

        let place = &coordinator.images()[0].place;
        assert_eq!(place.country.as_deref(), Some("USA"));
        assert_eq!(place.city.as_deref(), Some("San Francisco"));
        assert_eq!(place.state, None);
        assert_eq!(place.neighborhood, None);
    }

    #[tokio::test]
    async fn resolved_place_replaces_what_the_file_had() {
        let f = fixture(&[("img1.jpg", "A")], usa_san_francisco());
        {
            let mut files = f.tool.files.lock().unwrap();
            let existing = files.get_mut(&f.root.join("img1.jpg")).unwrap();
            existing.set(tags::STATE, "OldState");
            existing.set(tags::NEIGHBORHOOD, "OldHood");
        }
        let mut coordinator = f.coordinator();
        coordinator.open(&[f.root.clone()]).await.unwrap();
        assert_eq!(coordinator.images()[0].place.state.as_deref(), Some("OldState"));

        coordinator
            .reverse_geocode(&BatchControl::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(
            coordinator.images()[0].place,
            GeoPlace {
                country: Some("USA".into()),
                city: Some("San Francisco".into()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn progress_reported_once_per_record_and_reaches_total() {
        let mut geocoder = usa_san_francisco();
        // Later records finish first.
        geocoder.delays_ms = vec![40, 30, 20, 10, 0];
        let names: Vec<(String, &str)> = (0..10)
            .map(|i| (format!("img{i}.jpg"), if i % 3 == 0 { "V" } else { "A" }))
            .collect();
        let names: Vec<(&str, &str)> = names.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let f = fixture(&names, geocoder);
        let mut coordinator = f.coordinator().with_concurrency(4);
        coordinator.open(&[f.root.clone()]).await.unwrap();

        let mut reports = Vec::new();
        let summary = coordinator
            .reverse_geocode(&BatchControl::new(), |p| reports.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(reports.len(), 10);
        assert!(reports.windows(2).all(|w| w[0].completed < w[1].completed));
        assert_eq!(reports.last().unwrap().completed, 10);
        assert!(reports.iter().all(|p| p.total == 10));
        assert_eq!(reports.iter().filter(|p| p.is_finished()).count(), 1);
        assert_eq!(summary.skipped, 4);
        assert_eq!(summary.resolved, 6);
        assert_eq!(f.geocoder.calls(), 6);
    }

    #[tokio::test]
    async fn empty_batch_reports_nothing() {
        let f = fixture(&[], usa_san_francisco());
        let mut coordinator = f.coordinator();
        assert_eq!(coordinator.open(&[f.root.clone()]).await.unwrap(), 0);

        let mut calls = 0;
        let summary = coordinator
            .reverse_geocode(&BatchControl::new(), |_| calls += 1)
            .await
            .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn cancelled_batch_still_reaches_total() {
        let f = fixture(
            &[("a.jpg", "A"), ("b.jpg", "A"), ("c.jpg", "A"), ("d.jpg", "A")],
            usa_san_francisco(),
        );
        let mut coordinator = f.coordinator();
        coordinator.open(&[f.root.clone()]).await.unwrap();

        let control = BatchControl::new();
        let canceller = control.clone();
        let mut last = None;
        let summary = coordinator
            .reverse_geocode(&control, |p| {
                canceller.cancel();
                last = Some(p.clone());
            })
            .await
            .unwrap();

        assert_eq!(summary.completed(), 4);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.cancelled, 3);
        assert_eq!(last.unwrap().completed, 4);
        assert_eq!(f.geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn paused_batch_waits_for_resume() {
        let f = fixture(
            &[("a.jpg", "A"), ("b.jpg", "A"), ("c.jpg", "A"), ("d.jpg", "A")],
            usa_san_francisco(),
        );
        let mut coordinator = f.coordinator().with_concurrency(2);
        coordinator.open(&[f.root.clone()]).await.unwrap();

        let control = BatchControl::new();
        control.pause();
        let reported = AtomicUsize::new(0);
        let resume_later = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let held = (reported.load(Ordering::SeqCst), f.geocoder.calls());
            control.resume();
            held
        };

        let (summary, held) = tokio::join!(
            coordinator.reverse_geocode(&control, |p| reported.store(p.completed, Ordering::SeqCst)),
            resume_later
        );
        assert_eq!(held, (0, 0));
        assert_eq!(summary.unwrap().resolved, 4);
        assert_eq!(reported.load(Ordering::SeqCst), 4);
        assert_eq!(coordinator.state(), State::Ready);
    }

    #[tokio::test]
    async fn dropped_batch_returns_to_ready() {
        let mut geocoder = usa_san_francisco();
        geocoder.delays_ms = vec![500];
        let f = fixture(&[("a.jpg", "A")], geocoder);
        let mut coordinator = f.coordinator();
        coordinator.open(&[f.root.clone()]).await.unwrap();

        let control = BatchControl::new();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.reverse_geocode(&control, |_| {}),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(coordinator.state(), State::Ready);

        coordinator.write_images().await.unwrap();
        assert_eq!(coordinator.state(), State::Idle);
    }

    #[tokio::test]
    async fn failed_lookups_do_not_abort_the_batch() {
        let f = fixture(&[("a.jpg", "A"), ("b.jpg", "A")], StubGeocoder::failing());
        let mut coordinator = f.coordinator().with_concurrency(2);
        coordinator.open(&[f.root.clone()]).await.unwrap();

        let summary = coordinator
            .reverse_geocode(&BatchControl::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(summary.failed, 2);
        assert!(coordinator.images().iter().all(|r| r.place.is_empty()));
    }

    // ── write_images ──────────────────────────────────────────────────

    #[tokio::test]
    async fn write_stores_resolved_places() {
        let f = fixture(&[("a.jpg", "A"), ("v.jpg", "V")], usa_san_francisco());
        let mut coordinator = f.coordinator();
        coordinator.open(&[f.root.clone()]).await.unwrap();
        coordinator
            .reverse_geocode(&BatchControl::new(), |_| {})
            .await
            .unwrap();

        let summary = coordinator.write_images().await.unwrap();
        assert_eq!(summary, WriteSummary { written: 1, skipped: 1, failed: 0 });
        assert_eq!(f.tool.import_calls.load(Ordering::SeqCst), 1);

        let written = f.tool.metadata(f.root.join("a.jpg").to_str().unwrap());
        assert_eq!(written.string(tags::CITY).as_deref(), Some("San Francisco"));
        let untouched = f.tool.metadata(f.root.join("v.jpg").to_str().unwrap());
        assert_eq!(untouched.string(tags::CITY), None);
    }

    #[tokio::test]
    async fn per_file_write_path() {
        let f = fixture(&[("a.jpg", "A"), ("b.jpg", "A")], usa_san_francisco());
        let mut coordinator = f.coordinator().with_staged_write(false);
        coordinator.open(&[f.root.clone()]).await.unwrap();
        coordinator
            .reverse_geocode(&BatchControl::new(), |_| {})
            .await
            .unwrap();

        let summary = coordinator.write_images().await.unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(f.tool.update_calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.tool.import_calls.load(Ordering::SeqCst), 0);
    }
}
