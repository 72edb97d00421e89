//! NMEA sentence parsing for the secondary altitude listener.
//!
//! Only GGA sentences are of interest: field 9 carries the antenna altitude
//! above mean sea level, which is usually better than the ellipsoid altitude
//! the provider reports. See <http://aprs.gids.nl/nmea/#gga>.

/// Index of the MSL altitude field in a GGA sentence.
const GGA_ALTITUDE_FIELD: usize = 9;

/// Mean-sea-level altitude sample from a GGA sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MslAltitude {
    /// Altitude above mean sea level in meters.
    pub altitude: f64,
    /// When the sentence was received, in epoch milliseconds.
    pub timestamp_ms: i64,
}

/// Extract the MSL altitude from a GGA sentence.
///
/// Returns `None` for other sentence types, sentences without the leading
/// `$`, and GGA sentences whose altitude field is empty or unparseable.
pub fn parse_gga_altitude(sentence: &str) -> Option<f64> {
    if !sentence.starts_with('$') {
        return None;
    }

    let mut tokens = sentence.split(',');
    let kind = tokens.next()?;
    if !kind.ends_with("GGA") {
        return None;
    }

    let altitude = tokens.nth(GGA_ALTITUDE_FIELD - 1)?;
    if altitude.is_empty() {
        return None;
    }
    altitude.trim().parse().ok()
}
