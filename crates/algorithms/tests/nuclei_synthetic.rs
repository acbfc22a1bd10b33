//! Nucleus detection on synthetic tiles

use histotile_algorithms::detection::{DetectionChannel, NucleiParams, NucleiWatershedSegmenter};
use histotile_core::io::MemoryRegionSource;
use histotile_core::raster::rgb;
use histotile_core::{
    CancellationToken, Error, ImageMetadata, ObjectKind, PhysicalArea, PhysicalLength,
    PixelCalibration, RegionContext, RgbImage, Roi, StainSet,
};

const SIZE: usize = 64;
const RADIUS: f64 = 16.0;

/// Bright disk centred on the tile, on a darker background
fn disk_image() -> RgbImage {
    let mut image = RgbImage::filled(SIZE, SIZE, rgb::gray(50));
    let c = (SIZE as f64 - 1.0) / 2.0;
    for row in 0..SIZE {
        for col in 0..SIZE {
            let d2 = (col as f64 - c).powi(2) + (row as f64 - c).powi(2);
            if d2 <= RADIUS * RADIUS {
                image.set(row, col, rgb::gray(200)).unwrap();
            }
        }
    }
    image
}

fn bright_params() -> NucleiParams {
    NucleiParams {
        detection_channel: DetectionChannel::Intensity,
        threshold: 0.5 * (200.0 + 50.0) / 255.0,
        ..Default::default()
    }
}

#[test]
fn single_disk_gives_one_nucleus() {
    let source = MemoryRegionSource::new("disk", disk_image()).unwrap();
    let cancel = CancellationToken::new();
    let ctx = RegionContext::new(&source, &cancel);
    let segmenter = NucleiWatershedSegmenter::new(bright_params()).unwrap();
    let roi = Roi::rectangle(0.0, 0.0, SIZE as f64, SIZE as f64).unwrap();

    let nuclei = segmenter.detect(&ctx, Some(&roi)).unwrap().unwrap();
    assert_eq!(nuclei.len(), 1);

    let nucleus = &nuclei[0];
    assert_eq!(nucleus.kind(), ObjectKind::Detection);
    let (cx, cy) = nucleus.roi().centroid();
    assert!((cx - 32.0).abs() <= 1.0, "centroid x {}", cx);
    assert!((cy - 32.0).abs() <= 1.0, "centroid y {}", cy);

    let expected = std::f64::consts::PI * RADIUS * RADIUS;
    let area = nucleus.roi().area();
    assert!((area - expected).abs() / expected < 0.1, "area {}", area);

    let m = nucleus.measurements();
    assert!(m.is_closed());
    assert_eq!(m.get("Area"), Some(area));
    let circularity = m.get("Circularity").unwrap();
    assert!(circularity > 0.85 && circularity <= 1.0, "circularity {}", circularity);
    let mean = m.get("Intensity mean").unwrap();
    assert!(mean > 0.7, "mean {}", mean);
    assert!(m.get("DAB mean").is_none());
}

#[test]
fn h_dab_images_add_dab_intensities() {
    let metadata = ImageMetadata::new(SIZE, SIZE)
        .unwrap()
        .with_stains(Some(StainSet::h_dab().unwrap()));
    let source = MemoryRegionSource::new("disk-hdab", disk_image())
        .unwrap()
        .with_metadata(metadata)
        .unwrap();
    let cancel = CancellationToken::new();
    let ctx = RegionContext::new(&source, &cancel);
    let segmenter = NucleiWatershedSegmenter::new(bright_params()).unwrap();
    let roi = Roi::rectangle(0.0, 0.0, SIZE as f64, SIZE as f64).unwrap();

    let nuclei = segmenter.detect(&ctx, Some(&roi)).unwrap().unwrap();
    assert_eq!(nuclei.len(), 1);

    let m = nuclei[0].measurements();
    assert!(m.is_closed());
    let names: Vec<&str> = m.names().collect();
    let stats = ["mean", "std dev", "min", "max", "range"];
    let detection: Vec<String> = stats.iter().map(|s| format!("Intensity {}", s)).collect();
    let dab: Vec<String> = stats.iter().map(|s| format!("DAB {}", s)).collect();

    // Detection channel statistics come first, DAB statistics close the list
    let tail = &names[names.len() - 10..];
    assert_eq!(&tail[..5], detection.iter().map(String::as_str).collect::<Vec<_>>().as_slice());
    assert_eq!(&tail[5..], dab.iter().map(String::as_str).collect::<Vec<_>>().as_slice());

    let (min, mean, max) = (
        m.get("DAB min").unwrap(),
        m.get("DAB mean").unwrap(),
        m.get("DAB max").unwrap(),
    );
    assert!(min.is_finite() && min <= mean && mean <= max);
    assert!((m.get("DAB range").unwrap() - (max - min)).abs() < 1e-9);
}

#[test]
fn calibrated_areas_are_in_square_microns() {
    let mut image = disk_image();
    image.set_calibration(PixelCalibration::microns(0.5, 0.5).unwrap());
    let source = MemoryRegionSource::new("disk-um", image).unwrap();
    let cancel = CancellationToken::new();
    let ctx = RegionContext::new(&source, &cancel);
    let params = NucleiParams {
        opening_radius: PhysicalLength::new(12.0, 20.0),
        min_area: PhysicalArea::new(40.0, 100.0),
        ..bright_params()
    };
    let segmenter = NucleiWatershedSegmenter::new(params).unwrap();
    let roi = Roi::rectangle(0.0, 0.0, SIZE as f64, SIZE as f64).unwrap();

    let nuclei = segmenter.detect(&ctx, Some(&roi)).unwrap().unwrap();
    assert_eq!(nuclei.len(), 1);
    let area_um = nuclei[0].measurements().get("Area").unwrap();
    let area_px = nuclei[0].roi().area();
    assert!((area_um - area_px * 0.25).abs() < 1e-6);
    assert!(area_um >= 40.0);
}

#[test]
fn polygon_parent_contains_every_nucleus() {
    let source = MemoryRegionSource::new("disk", disk_image()).unwrap();
    let cancel = CancellationToken::new();
    let ctx = RegionContext::new(&source, &cancel);
    let segmenter = NucleiWatershedSegmenter::new(bright_params()).unwrap();

    // Diamond enclosing the disk
    let around = Roi::from_points(&[(32.0, 0.0), (64.0, 32.0), (32.0, 64.0), (0.0, 32.0)]).unwrap();
    let nuclei = segmenter.detect(&ctx, Some(&around)).unwrap().unwrap();
    assert_eq!(nuclei.len(), 1);
    for nucleus in &nuclei {
        assert!(around.contains_polygon(&nucleus.roi().to_polygon()));
        assert!(nucleus.measurements().get("Area").unwrap() >= 100.0);
    }

    // Triangle cutting through the disk
    let cut = Roi::from_points(&[(0.0, 0.0), (40.0, 0.0), (0.0, 40.0)]).unwrap();
    let nuclei = segmenter.detect(&ctx, Some(&cut)).unwrap().unwrap();
    assert!(nuclei.iter().all(|n| cut.contains_polygon(&n.roi().to_polygon())));
}

#[test]
fn blank_tile_has_no_nuclei() {
    let source = MemoryRegionSource::new("blank", RgbImage::filled(SIZE, SIZE, rgb::gray(240))).unwrap();
    let cancel = CancellationToken::new();
    let ctx = RegionContext::new(&source, &cancel);
    let segmenter = NucleiWatershedSegmenter::new(NucleiParams::default()).unwrap();
    let roi = Roi::rectangle(0.0, 0.0, SIZE as f64, SIZE as f64).unwrap();
    let nuclei = segmenter.detect(&ctx, Some(&roi)).unwrap().unwrap();
    assert!(nuclei.is_empty());
}

#[test]
fn cancelled_unit_returns_cancelled() {
    let source = MemoryRegionSource::new("disk", disk_image()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = RegionContext::new(&source, &cancel);
    let segmenter = NucleiWatershedSegmenter::new(bright_params()).unwrap();
    let roi = Roi::rectangle(0.0, 0.0, SIZE as f64, SIZE as f64).unwrap();
    assert!(matches!(segmenter.detect(&ctx, Some(&roi)), Err(Error::Cancelled)));
}
