//! Cell value types

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Elevations and accumulations are `f64`, D8 codes and masks `u8`.
/// Integer types are kept so DEMs stored as 16/32-bit integers decode directly.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Value written where a cell has no data and no sentinel was declared
    fn default_nodata() -> Self;

    /// Whether this value represents no-data under the given sentinel
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            // NaN is always no-data, with or without a declared sentinel.
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                self.is_nan()
                    || nodata.is_some_and(|nd| (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0))
            }
        }
    )*};
}

impl_int_element!(u8, i16, u16, i32, u32);
impl_float_element!(f32, f64);
