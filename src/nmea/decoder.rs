//! # NMEA Sentence Decoder
//!
//! Decodes RMC (date/time) and GGA (position) sentences into [`PositionFix`]
//! values. Decoding is pure: unrecognized sentences yield `Ok(None)`, broken
//! ones yield an error and are dropped by the caller.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use super::protocol::*;
use crate::error::{GeoDetectorError, Result};
use crate::geo::Coordinate;

/// Classify a line by its 5-character tag.
///
/// Returns `None` for anything that is not an RMC or GGA sentence.
pub fn classify(line: &str) -> Option<SentenceKind> {
    let tag = line
        .strip_prefix(NMEA_SENTENCE_START)?
        .get(..NMEA_TAG_LEN)?;
    SentenceKind::from_tag(tag)
}

/// Decode one line of text.
///
/// # Returns
///
/// * `Ok(Some(fix))` - Recognized and decoded sentence
/// * `Ok(None)` - Sentence kind this decoder does not consume
///
/// # Errors
///
/// Returns `MalformedField` when a required field is missing and
/// `NumericParse` when a field does not hold the expected number.
///
/// # Examples
///
/// ```
/// use geo_detector::nmea::decoder::decode_sentence;
///
/// let fix = decode_sentence("$GPGSV,3,1,11,10,63,137,17*7A").unwrap();
/// assert!(fix.is_none());
/// ```
pub fn decode_sentence(line: &str) -> Result<Option<PositionFix>> {
    match classify(line) {
        Some(SentenceKind::Rmc) => decode_rmc(line).map(Some),
        Some(SentenceKind::Gga) => decode_gga(line).map(Some),
        None => Ok(None),
    }
}

/// Decode an RMC sentence into a UTC date-time.
///
/// Form: `$GPRMC,154007.00,A,3835.17128,N,07745.57692,W,0.070,,220319,,,A*67`
pub fn decode_rmc(line: &str) -> Result<PositionFix> {
    let fields: Vec<&str> = line.split(',').collect();

    let time_field = field(&fields, RMC_FIELD_TIME);
    if time_field.get(..2).map_or(true, str::is_empty) {
        return Err(GeoDetectorError::MalformedField {
            sentence: "RMC",
            field: "time",
        });
    }
    let time = parse_time_of_day(time_field)?;

    let date_field = field(&fields, RMC_FIELD_DATE);
    if date_field.is_empty() {
        return Err(GeoDetectorError::MalformedField {
            sentence: "RMC",
            field: "date",
        });
    }
    let date = parse_date(date_field)?;

    Ok(PositionFix::Rmc {
        timestamp: Utc.from_utc_datetime(&date.and_time(time)),
    })
}

/// Decode a GGA sentence into a time of day and a decimal coordinate.
///
/// Form: `$GPGGA,002852.00,3835.14680,N,07745.58318,W,1,03,5.60,127.9,M,-34.5,M,,*61`
pub fn decode_gga(line: &str) -> Result<PositionFix> {
    let fields: Vec<&str> = line.split(',').collect();

    let lat_text = field(&fields, GGA_FIELD_LAT);
    if lat_text.is_empty() {
        return Err(GeoDetectorError::MalformedField {
            sentence: "GGA",
            field: "latitude",
        });
    }
    let lon_text = field(&fields, GGA_FIELD_LON);
    if lon_text.is_empty() {
        return Err(GeoDetectorError::MalformedField {
            sentence: "GGA",
            field: "longitude",
        });
    }
    let lat_hemisphere = field(&fields, GGA_FIELD_LAT_HEMISPHERE);
    let lon_hemisphere = field(&fields, GGA_FIELD_LON_HEMISPHERE);

    let mut lat = degrees_minutes("latitude", lat_text, 2)?;
    if lat_hemisphere == "S" {
        lat = -lat;
    }
    let mut lon = degrees_minutes("longitude", lon_text, 3)?;
    if lon_hemisphere == "W" {
        lon = -lon;
    }

    if !(-90.0..90.0).contains(&lat) {
        return Err(numeric_error("latitude", lat_text));
    }
    if !(-180.0..180.0).contains(&lon) {
        return Err(numeric_error("longitude", lon_text));
    }

    let time = match field(&fields, GGA_FIELD_TIME) {
        "" => None,
        text => Some(parse_time_of_day(text)?),
    };

    Ok(PositionFix::Gga {
        time,
        coordinate: Coordinate::new(lon, lat),
        raw: RawPosition {
            latitude: lat_text.to_string(),
            lat_hemisphere: lat_hemisphere.to_string(),
            longitude: lon_text.to_string(),
            lon_hemisphere: lon_hemisphere.to_string(),
        },
    })
}

fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or("")
}

fn numeric_error(field: &'static str, value: &str) -> GeoDetectorError {
    GeoDetectorError::NumericParse {
        field,
        value: value.to_string(),
    }
}

/// Two digit group starting at `start`, e.g. the minutes of `HHMMSS.ss`.
fn two_digits(field: &'static str, text: &str, start: usize) -> Result<u32> {
    text.get(start..start + 2)
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| numeric_error(field, text))
}

/// `HHMMSS.ss`; fractional seconds are dropped.
fn parse_time_of_day(text: &str) -> Result<NaiveTime> {
    let hour = two_digits("time", text, 0)?;
    let minute = two_digits("time", text, 2)?;
    let second = two_digits("time", text, 4)?;
    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| numeric_error("time", text))
}

/// `DDMMYY`
fn parse_date(text: &str) -> Result<NaiveDate> {
    let day = two_digits("date", text, 0)?;
    let month = two_digits("date", text, 2)?;
    let year = two_digits("date", text, 4)?;
    NaiveDate::from_ymd_opt(NMEA_CENTURY + year as i32, month, day)
        .ok_or_else(|| numeric_error("date", text))
}

/// Convert `DDMM.mmmm` (or `DDDMM.mmmm`) to decimal degrees.
fn degrees_minutes(field: &'static str, text: &str, degree_digits: usize) -> Result<f64> {
    let degrees: f64 = text
        .get(..degree_digits)
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| numeric_error(field, text))?;
    let minutes: f64 = text
        .get(degree_digits..)
        .and_then(|m| m.parse().ok())
        .ok_or_else(|| numeric_error(field, text))?;
    Ok(degrees + minutes / 60.0)
}
