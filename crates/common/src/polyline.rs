//! Encoded polyline decoding.
//!
//! Decodes the Google encoded polyline format used by routing providers for
//! route geometry. Output is always canonical `[lng, lat]` order.

use crate::coords::Coordinate;

/// Precision used by the Google format and OpenRouteService.
pub const DEFAULT_PRECISION: u32 = 5;

// A 32-bit delta never needs more than seven 5-bit chunks.
const MAX_SHIFT: u32 = 35;

/// Decodes an encoded polyline at precision 1e5.
///
/// Never panics. On malformed input the points decoded up to that position
/// are returned.
pub fn decode(encoded: &str) -> Vec<Coordinate> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

/// Decodes an encoded polyline with `precision` decimal digits (5 or 6 in practice).
pub fn decode_with_precision(encoded: &str, precision: u32) -> Vec<Coordinate> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let Some(dlat) = next_delta(bytes, &mut index) else {
            tracing::debug!(index, "Polyline truncated while reading latitude");
            break;
        };
        let Some(dlng) = next_delta(bytes, &mut index) else {
            tracing::debug!(index, "Polyline truncated while reading longitude");
            break;
        };
        lat += dlat;
        lng += dlng;
        points.push(Coordinate::new(lng as f64 / factor, lat as f64 / factor));
    }

    points
}

/// Reads one zig-zag varint, advancing `index`. `None` on invalid or truncated input.
fn next_delta(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index)?;
        let chunk = byte.checked_sub(63).filter(|c| *c < 64)? as i64;
        *index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
        if shift >= MAX_SHIFT {
            return None;
        }
    }

    Some(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[Coordinate], expected: &[[f64; 2]]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a.longitude - e[0]).abs() < 1e-9, "{a} vs {e:?}");
            assert!((a.latitude - e[1]).abs() < 1e-9, "{a} vs {e:?}");
        }
    }

    #[test]
    fn decodes_reference_fixture() {
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@");
        assert_close(&points, &[[-120.2, 38.5], [-120.95, 40.7], [-126.453, 43.252]]);
    }

    #[test]
    fn empty_string_is_empty_path() {
        assert!(decode("").is_empty());
    }

    #[test]
    fn invalid_character_returns_prefix() {
        // First point intact, then a byte below '?'.
        let points = decode("_p~iF~ps|U !!");
        assert_close(&points, &[[-120.2, 38.5]]);
    }

    #[test]
    fn immediate_failure_is_empty() {
        assert!(decode("\u{1}\u{2}").is_empty());
        assert!(decode("é").is_empty());
    }

    #[test]
    fn dangling_latitude_is_dropped() {
        let points = decode("_p~iF~ps|U_ulL");
        assert_close(&points, &[[-120.2, 38.5]]);
    }

    #[test]
    fn truncated_varint_is_dropped() {
        // '_' has the continuation bit set and nothing follows it.
        let points = decode("_p~iF~ps|U_");
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn endless_continuation_does_not_overflow() {
        assert!(decode(&"~".repeat(64)).is_empty());
    }

    #[test]
    fn precision_six() {
        // 38.5,-120.2 encoded at 1e6
        let points = decode_with_precision("_izlhA~rlgdF", 6);
        assert_close(&points, &[[-120.2, 38.5]]);
    }
}
