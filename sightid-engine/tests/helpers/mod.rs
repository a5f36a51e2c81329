//! Test Helper Utilities
//!
//! Shared utilities for sightid-engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use sightid_engine::services::{GeocodeError, Locality, ReverseGeocoder};
use sightid_engine::{EngineConfig, SightingSubmission, SubmissionService};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary catalog database
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = sightid_common::db::init_database(&temp_dir.path().join("sightid.db"))
        .await
        .expect("Failed to initialize test database");
    (temp_dir, pool)
}

/// Geocoder returning a fixed answer and counting calls
pub struct StubGeocoder {
    answer: Option<Locality>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn ok(state: &str, city: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(Locality {
                state: state.to_string(),
                city: city.to_string(),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Locality, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().ok_or(GeocodeError::Api(503))
    }
}

/// Service over `pool` with the given config and geocoder
pub fn service(pool: &SqlitePool, config: &EngineConfig, geocoder: Arc<StubGeocoder>) -> SubmissionService {
    SubmissionService::new(pool.clone(), config, geocoder)
}

/// PNG bytes of an image
pub fn png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Bright disc on a dark background
pub fn disc(size: u32, radius: f32, foreground: u8, background: u8) -> RgbImage {
    let c = size as f32 / 2.0;
    RgbImage::from_fn(size, size, |x, y| {
        let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
        if d <= radius {
            Rgb([foreground; 3])
        } else {
            Rgb([background; 3])
        }
    })
}

/// Gaussian-blurred pixel noise stretched to the full intensity range;
/// each seed gives an unrelated texture
pub fn blurred_noise(size: u32, sigma: f32, seed: u32) -> RgbImage {
    let noise = GrayImage::from_fn(size, size, |x, y| {
        let mut h = x.wrapping_mul(0x8da6_b343) ^ y.wrapping_mul(0xd816_3841) ^ seed.wrapping_mul(0xcb1a_b31f);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2c1b_3c6d);
        h ^= h >> 12;
        h = h.wrapping_mul(0x297a_2d39);
        h ^= h >> 15;
        Luma([(h >> 24) as u8])
    });
    let blurred = gaussian_blur_f32(&noise, sigma);

    let (lo, hi) = blurred
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    let range = f32::from(hi.saturating_sub(lo)).max(1.0);

    RgbImage::from_fn(size, size, |x, y| {
        let v = f32::from(blurred.get_pixel(x, y).0[0] - lo) * 255.0 / range;
        Rgb([v.round() as u8; 3])
    })
}

/// JPEG of `image` carrying an EXIF GPS position (whole D/M/S)
pub fn jpeg_with_gps(image: &RgbImage, latitude: (u32, u32, u32), lat_ref: u8, longitude: (u32, u32, u32), lon_ref: u8) -> Vec<u8> {
    let mut jpeg = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();

    fn entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value);
    }

    // Little-endian TIFF: IFD0 -> GPS IFD at 26 -> rationals at 80 and 104
    let mut tiff = b"II*\0".to_vec();
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    entry(&mut tiff, 0x8825, 4, 1, 26u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(&4u16.to_le_bytes());
    entry(&mut tiff, 0x0001, 2, 2, [lat_ref, 0, 0, 0]);
    entry(&mut tiff, 0x0002, 5, 3, 80u32.to_le_bytes());
    entry(&mut tiff, 0x0003, 2, 2, [lon_ref, 0, 0, 0]);
    entry(&mut tiff, 0x0004, 5, 3, 104u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    for (d, m, s) in [latitude, longitude] {
        for value in [d, m, s] {
            tiff.extend_from_slice(&value.to_le_bytes());
            tiff.extend_from_slice(&1u32.to_le_bytes());
        }
    }

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);
    jpeg.splice(2..2, segment);
    jpeg
}

/// Submission of `head` (body photo is a fixed disc) in São Paulo
pub fn submission(head: Vec<u8>, name: Option<&str>) -> SightingSubmission {
    SightingSubmission {
        photo_body: png(&disc(64, 20.0, 200, 30)),
        photo_head: head,
        date: "2023-10-05".to_string(),
        latitude: Some(-23.55),
        longitude: Some(-46.63),
        name_hint: name.map(str::to_string),
    }
}

/// Large disc photo: one individual
pub fn photo_p1() -> Vec<u8> {
    png(&disc(180, 60.0, 230, 20))
}

/// Small disc photo: a clearly different individual
pub fn photo_p2() -> Vec<u8> {
    png(&disc(180, 15.0, 230, 20))
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
