//! Unit isolation, cancellation and shared region reads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use histotile_core::io::MemoryRegionSource;
use histotile_core::raster::rgb;
use histotile_core::region::TileListener;
use histotile_core::{
    CancellationToken, Error, RegionContext, RegionRequest, RegionSource, RegionStore, RgbImage, Roi,
};
use histotile_parallel::{run_units, ProcessingMode, RunSummary, TilePlan, UnitOutcome};

const MODES: [ProcessingMode; 3] = [
    ProcessingMode::Sequential,
    ProcessingMode::Parallel,
    ProcessingMode::ParallelWith(4),
];

struct CountingListener(AtomicUsize);

impl TileListener for CountingListener {
    fn tile_available(&self, _request: &RegionRequest, _tile: &RgbImage) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn source() -> MemoryRegionSource {
    MemoryRegionSource::new("units", RgbImage::filled(64, 64, rgb::gray(90))).unwrap()
}

#[test]
fn test_failures_do_not_affect_siblings() {
    let items: Vec<usize> = (0..20).collect();
    for mode in MODES {
        let cancel = CancellationToken::new();
        let outcomes = run_units(mode, &items, &cancel, |&i| match i % 5 {
            0 => Err(Error::Other(format!("unit {} broke", i))),
            1 => panic!("unit {} panicked", i),
            2 => Ok(None),
            _ => Ok(Some(i * 10)),
        });

        assert_eq!(outcomes.len(), 20);
        for (i, outcome) in outcomes.iter().enumerate() {
            match i % 5 {
                0 => assert_eq!(outcome, &UnitOutcome::Failed(format!("unit {} broke", i))),
                1 => assert!(matches!(outcome, UnitOutcome::Failed(r) if r.contains("panicked"))),
                2 => assert_eq!(outcome, &UnitOutcome::Skipped),
                _ => assert_eq!(outcome, &UnitOutcome::Completed(i * 10)),
            }
        }
        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary.completed, 8);
        assert_eq!(summary.failed, 8);
        assert_eq!(summary.skipped, 4);
    }
}

#[test]
fn test_cancelled_token_skips_remaining_units() {
    let items: Vec<usize> = (0..10).collect();
    let cancel = CancellationToken::new();
    let calls = AtomicUsize::new(0);

    let outcomes = run_units(ProcessingMode::Sequential, &items, &cancel, |&i| {
        calls.fetch_add(1, Ordering::SeqCst);
        if i == 3 {
            cancel.cancel();
        }
        cancel.check()?;
        Ok(Some(i))
    });

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(&outcomes[..3], &[
        UnitOutcome::Completed(0),
        UnitOutcome::Completed(1),
        UnitOutcome::Completed(2),
    ]);
    assert!(outcomes[3..].iter().all(|o| *o == UnitOutcome::Cancelled));
}

#[test]
fn test_units_share_one_fetch_per_request() {
    let source = source();
    let store = RegionStore::default();
    let cancel = CancellationToken::new();
    let counter = Arc::new(CountingListener(AtomicUsize::new(0)));
    let listener: Arc<dyn TileListener> = counter.clone();
    let ctx = RegionContext::new(&source, &cancel)
        .with_store(&store)
        .with_listener(&listener);

    let request = RegionRequest::new(source.image_id(), 2.0, 0, 0, 32, 32).unwrap();
    let items: Vec<usize> = (0..16).collect();
    let outcomes = run_units(ProcessingMode::ParallelWith(4), &items, &cancel, |_| {
        let _subscription = ctx.subscribe();
        let tile = ctx.fetch(&request)?;
        Ok(Some(tile.width() * tile.height()))
    });

    assert!(outcomes.iter().all(|o| *o == UnitOutcome::Completed(256)));
    assert_eq!(store.fetch_count(), 1);
    // Every subscription was dropped with its unit
    assert_eq!(store.listener_count(), 0);
    assert!(counter.0.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_failed_units_release_subscriptions() {
    let source = source();
    let store = RegionStore::default();
    let cancel = CancellationToken::new();
    let listener: Arc<dyn TileListener> = Arc::new(CountingListener(AtomicUsize::new(0)));
    let ctx = RegionContext::new(&source, &cancel)
        .with_store(&store)
        .with_listener(&listener);

    let items = [false, true, false];
    let outcomes = run_units(ProcessingMode::Parallel, &items, &cancel, |&explode| {
        let _subscription = ctx.subscribe();
        if explode {
            panic!("exploded while subscribed");
        }
        // Outside the image: both read paths fail
        let request = RegionRequest::new(source.image_id(), 1.0, 500, 500, 10, 10)?;
        ctx.fetch(&request).map(|_| Some(()))
    });

    assert!(outcomes.iter().all(|o| matches!(o, UnitOutcome::Failed(_))));
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn test_tiles_of_a_roi_as_units() {
    let source = source();
    let store = RegionStore::default();
    let cancel = CancellationToken::new();
    let ctx = RegionContext::new(&source, &cancel).with_store(&store);

    let roi = Roi::rectangle(0.0, 0.0, 64.0, 64.0).unwrap();
    let tiles = TilePlan::new(16.0, 0.0).unwrap().tiles_for_roi(&roi);
    assert_eq!(tiles.len(), 16);

    let outcomes = run_units(ProcessingMode::Parallel, &tiles, &cancel, |tile| {
        let b = tile.bounds;
        let request = RegionRequest::new(
            source.image_id(),
            1.0,
            b.min().x as i64,
            b.min().y as i64,
            b.width() as u32,
            b.height() as u32,
        )?;
        let pixels = ctx.fetch(&request)?;
        Ok(Some(pixels.data().len()))
    });

    let total: usize = outcomes.into_iter().filter_map(UnitOutcome::completed).sum();
    assert_eq!(total, 64 * 64);
    assert_eq!(store.fetch_count(), 16);
}
