//! Concurrency contract of the shared region store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use histotile_core::image::ImageMetadata;
use histotile_core::raster::rgb;
use histotile_core::region::{fetch_region, TileListener};
use histotile_core::{
    CancellationToken, Error, RegionRequest, RegionSource, RegionStore, Result, RgbImage,
};

/// Source that counts reads and can be told to fail its fast path
struct CountingSource {
    metadata: ImageMetadata,
    reads: AtomicUsize,
    direct_reads: AtomicUsize,
    fail_fast_path: bool,
}

impl CountingSource {
    fn new(fail_fast_path: bool) -> Self {
        Self {
            metadata: ImageMetadata::new(1000, 1000).unwrap(),
            reads: AtomicUsize::new(0),
            direct_reads: AtomicUsize::new(0),
            fail_fast_path,
        }
    }
}

impl RegionSource for CountingSource {
    fn image_id(&self) -> &str {
        "counting"
    }

    fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    fn read_region(&self, request: &RegionRequest) -> Result<RgbImage> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        // Keep the read in flight long enough for other threads to pile up
        thread::sleep(Duration::from_millis(20));
        if self.fail_fast_path {
            return Err(Error::Other("tile server unavailable".to_string()));
        }
        let (w, h) = request.output_size();
        Ok(RgbImage::filled(h, w, rgb::gray(128)))
    }

    fn read_region_direct(&self, request: &RegionRequest) -> Result<RgbImage> {
        self.direct_reads.fetch_add(1, Ordering::SeqCst);
        let (w, h) = request.output_size();
        Ok(RgbImage::filled(h, w, rgb::gray(64)))
    }
}

#[derive(Default)]
struct CountingListener {
    seen: AtomicUsize,
}

impl TileListener for CountingListener {
    fn tile_available(&self, _request: &RegionRequest, _tile: &RgbImage) {
        self.seen.fetch_add(1, Ordering::SeqCst);
    }

    fn requires_tile(&self, request: &RegionRequest) -> bool {
        request.image_id == "counting"
    }
}

#[test]
fn identical_concurrent_requests_fetch_once() {
    let source = Arc::new(CountingSource::new(false));
    let store = Arc::new(RegionStore::default());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let source = Arc::clone(&source);
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let request = RegionRequest::new("counting", 2.0, 100, 100, 64, 64).unwrap();
                barrier.wait();
                store.get_region(source.as_ref(), &request).unwrap()
            })
        })
        .collect();

    let tiles: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.fetch_count(), 1);
    assert!(tiles.iter().all(|t| Arc::ptr_eq(t, &tiles[0])));
    assert_eq!(tiles[0].shape(), (32, 32));
}

#[test]
fn distinct_requests_fetch_separately() {
    let source = CountingSource::new(false);
    let store = RegionStore::default();
    let a = RegionRequest::new("counting", 1.0, 0, 0, 8, 8).unwrap();
    let b = a.clone().with_plane(0, 1);
    store.get_region(&source, &a).unwrap();
    store.get_region(&source, &b).unwrap();
    store.get_region(&source, &a).unwrap();
    assert_eq!(source.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn subscription_is_released_on_drop() {
    let source = CountingSource::new(false);
    let store = RegionStore::default();
    let listener = Arc::new(CountingListener::default());
    {
        let _subscription = store.subscribe(listener.clone());
        assert_eq!(store.listener_count(), 1);
        let request = RegionRequest::new("counting", 1.0, 0, 0, 4, 4).unwrap();
        store.get_region(&source, &request).unwrap();
    }
    assert_eq!(store.listener_count(), 0);
    assert_eq!(listener.seen.load(Ordering::SeqCst), 1);

    // No notification once unsubscribed
    let request = RegionRequest::new("counting", 1.0, 4, 4, 4, 4).unwrap();
    store.get_region(&source, &request).unwrap();
    assert_eq!(listener.seen.load(Ordering::SeqCst), 1);
}

#[test]
fn subscription_released_when_unit_panics() {
    let store = Arc::new(RegionStore::default());
    let listener = Arc::new(CountingListener::default());
    let result = {
        let store = Arc::clone(&store);
        let listener = listener.clone();
        thread::spawn(move || {
            let _subscription = store.subscribe(listener);
            panic!("unit failed");
        })
        .join()
    };
    assert!(result.is_err());
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn failed_fast_path_falls_back_to_direct_read() {
    let source = CountingSource::new(true);
    let store = RegionStore::default();
    let request = RegionRequest::new("counting", 1.0, 0, 0, 4, 4).unwrap();
    let tile = fetch_region(Some(&store), &source, &request, &CancellationToken::new()).unwrap();
    assert_eq!(tile.get(0, 0).unwrap(), rgb::gray(64));
    assert_eq!(source.direct_reads.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_fetch_does_not_read() {
    let source = CountingSource::new(false);
    let store = RegionStore::default();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = RegionRequest::new("counting", 1.0, 0, 0, 4, 4).unwrap();
    let result = fetch_region(Some(&store), &source, &request, &cancel);
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(source.reads.load(Ordering::SeqCst), 0);
}
