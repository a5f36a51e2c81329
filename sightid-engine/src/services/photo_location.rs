//! Sighting coordinates
//!
//! GPS tags in a photo's EXIF block take precedence; the photos are tried in
//! submission order and the first one with a complete, in-range position
//! wins. Coordinates supplied with the request are the fallback.

use crate::error::{SubmissionError, SubmissionResult};
use exif::{In, Reader, Tag, Value};
use std::io::Cursor;
use tracing::debug;

/// Decimal-degree position, south and west negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Where a sighting's coordinates came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSource {
    Exif,
    Submitted,
}

/// Degrees/minutes/seconds plus hemisphere reference to signed degrees
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: u8) -> f64 {
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.to_ascii_uppercase() {
        b'S' | b'W' => -value,
        _ => value,
    }
}

fn gps_component(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let dms = match exif.get_field(value_tag, In::PRIMARY)?.value {
        Value::Rational(ref parts) if parts.len() >= 3 => {
            [parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64()]
        }
        _ => return None,
    };

    let reference = match exif.get_field(ref_tag, In::PRIMARY)?.value {
        Value::Ascii(ref strings) => strings.first()?.first().copied()?,
        _ => return None,
    };

    Some(dms_to_decimal(dms[0], dms[1], dms[2], reference))
}

/// GPS position recorded in a photo, if it carries a usable one
pub fn exif_coordinates(photo: &[u8]) -> Option<Coordinates> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(photo)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(error = %e, "No EXIF block in photo");
            return None;
        }
    };

    let coordinates = Coordinates {
        latitude: gps_component(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?,
        longitude: gps_component(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?,
    };

    if coordinates.is_valid() {
        Some(coordinates)
    } else {
        debug!(?coordinates, "Ignoring out-of-range EXIF GPS position");
        None
    }
}

/// Pick the sighting position from the photos' EXIF, else `submitted`
///
/// `submitted` values must already be range-checked. Neither source having
/// a position is `MissingCoordinates`.
pub fn resolve_coordinates(
    photos: &[&[u8]],
    submitted: Option<Coordinates>,
) -> SubmissionResult<(Coordinates, CoordinateSource)> {
    if let Some(coordinates) = photos.iter().find_map(|photo| exif_coordinates(photo)) {
        return Ok((coordinates, CoordinateSource::Exif));
    }

    submitted
        .map(|coordinates| (coordinates, CoordinateSource::Submitted))
        .ok_or(SubmissionError::MissingCoordinates)
}
