//! Location fixes: the canonical record, native input, normalization,
//! key aliasing and geodesic distance.
//!
//! ```text
//! NativeFix ──► FixNormalizer ──► Fix ──► Serialize (GeoKeys aliases)
//!    │                             │
//!    └──────── distance_m ◄────────┘
//! ```

mod geodesic;
mod keys;
mod model;
mod normalize;

pub use geodesic::{distance_m, MEAN_EARTH_RADIUS_M, WGS84_A, WGS84_F};
pub use keys::{
    geo_keys, set_geo_location_keys, AltitudeKey, GeoKeys, LatitudeKey, LongitudeKey, UnknownKey,
};
pub use model::{Fix, NativeFix};
pub use normalize::FixNormalizer;
