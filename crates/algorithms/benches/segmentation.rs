//! Benchmarks for segmentation building blocks and pipelines

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use histotile_algorithms::detection::{DetectionChannel, NucleiParams, NucleiWatershedSegmenter};
use histotile_algorithms::morphology::{opening, reconstruct_by_dilation, StructuringElement};
use histotile_algorithms::segmentation::{distance_transform, find_maxima, watershed, BinaryImage, WatershedParams};
use histotile_core::raster::rgb;
use histotile_core::{PixelCalibration, RegionRequest, RgbImage, Roi, ScalarImage};

/// Grid of bright blobs on a dark background
fn create_blob_image(size: usize) -> ScalarImage {
    let mut image = ScalarImage::new(size, size);
    for row in 0..size {
        for col in 0..size {
            let dx = (col % 24) as f32 - 12.0;
            let dy = (row % 24) as f32 - 12.0;
            let v = (-(dx * dx + dy * dy) / 40.0).exp();
            image.set(row, col, v).unwrap();
        }
    }
    image
}

fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation/reconstruction");
    for size in [128, 256, 512] {
        let mask = create_blob_image(size);
        let marker = opening(&mask, &StructuringElement::Disk(8)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| reconstruct_by_dilation(black_box(&marker), &mask).unwrap())
        });
    }
    group.finish();
}

fn bench_watershed(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation/watershed");
    for size in [128, 256, 512] {
        let image = create_blob_image(size);
        let (markers, _) = find_maxima(&image, 0.1, None).unwrap();
        let params = WatershedParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| watershed(black_box(&image), &markers, None, &params).unwrap())
        });
    }
    group.finish();
}

fn bench_distance_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation/distance_transform");
    for size in [128, 256, 512] {
        let mask: BinaryImage = create_blob_image(size).map(|v| u8::from(v > 0.3));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| distance_transform(black_box(&mask)).unwrap())
        });
    }
    group.finish();
}

fn bench_nuclei(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation/nuclei");
    group.sample_size(10);
    let params = NucleiParams {
        detection_channel: DetectionChannel::Intensity,
        ..Default::default()
    };
    let segmenter = NucleiWatershedSegmenter::new(params).unwrap();
    let calibration = PixelCalibration::uncalibrated();
    for size in [128, 256] {
        let tile: RgbImage = create_blob_image(size).map(|v| rgb::gray((40.0 + 180.0 * v) as u8));
        let request = RegionRequest::new("bench", 1.0, 0, 0, size as u32, size as u32).unwrap();
        let roi = Roi::rectangle(0.0, 0.0, size as f64, size as f64).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                segmenter
                    .detect_in_tile(black_box(&tile), &request, &roi, None, &calibration)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_reconstruction,
    bench_watershed,
    bench_distance_transform,
    bench_nuclei
);
criterion_main!(benches);
