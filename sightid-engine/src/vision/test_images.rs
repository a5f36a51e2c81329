//! Synthetic photos for unit tests

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;

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

/// Gaussian-blurred pixel noise stretched to the full intensity range
///
/// Each seed gives an unrelated texture.
pub fn blurred_noise(size: u32, sigma: f32, seed: u32) -> RgbImage {
    let noise = GrayImage::from_fn(size, size, |x, y| Luma([noise_value(x, y, seed)]));
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

fn noise_value(x: u32, y: u32, seed: u32) -> u8 {
    let mut h = x.wrapping_mul(0x8da6_b343) ^ y.wrapping_mul(0xd816_3841) ^ seed.wrapping_mul(0xcb1a_b31f);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2c1b_3c6d);
    h ^= h >> 12;
    h = h.wrapping_mul(0x297a_2d39);
    h ^= h >> 15;
    (h >> 24) as u8
}

/// JPEG of `image` with an EXIF block holding only a GPS position
///
/// Positions are whole degrees, minutes and seconds.
pub fn jpeg_with_gps(
    image: &RgbImage,
    latitude: (u32, u32, u32),
    latitude_ref: u8,
    longitude: (u32, u32, u32),
    longitude_ref: u8,
) -> Vec<u8> {
    let mut jpeg = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();

    let tiff = gps_tiff(latitude, latitude_ref, longitude, longitude_ref);
    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);

    // APP1 right after SOI
    jpeg.splice(2..2, segment);
    jpeg
}

/// Little-endian TIFF: IFD0 with a GPS IFD pointer, GPS IFD with the four
/// position tags, then the two rational triples
fn gps_tiff(
    latitude: (u32, u32, u32),
    latitude_ref: u8,
    longitude: (u32, u32, u32),
    longitude_ref: u8,
) -> Vec<u8> {
    const GPS_IFD: u32 = 26;
    const LAT_DATA: u32 = GPS_IFD + 2 + 4 * 12 + 4;
    const LON_DATA: u32 = LAT_DATA + 24;

    fn entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value);
    }

    fn rationals(out: &mut Vec<u8>, (d, m, s): (u32, u32, u32)) {
        for value in [d, m, s] {
            out.extend_from_slice(&value.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
        }
    }

    let mut out = b"II*\0".to_vec();
    out.extend_from_slice(&8u32.to_le_bytes());

    // IFD0
    out.extend_from_slice(&1u16.to_le_bytes());
    entry(&mut out, 0x8825, 4, 1, GPS_IFD.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    // GPS IFD (ASCII refs fit inline)
    out.extend_from_slice(&4u16.to_le_bytes());
    entry(&mut out, 0x0001, 2, 2, [latitude_ref, 0, 0, 0]);
    entry(&mut out, 0x0002, 5, 3, LAT_DATA.to_le_bytes());
    entry(&mut out, 0x0003, 2, 2, [longitude_ref, 0, 0, 0]);
    entry(&mut out, 0x0004, 5, 3, LON_DATA.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    rationals(&mut out, latitude);
    rationals(&mut out, longitude);
    out
}
