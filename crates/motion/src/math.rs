//! Float intrinsics, switched between `std` and `libm`.

#[cfg(feature = "std")]
#[inline]
pub(crate) fn sqrtf(v: f32) -> f32 {
    v.sqrt()
}

#[cfg(not(feature = "std"))]
#[inline]
pub(crate) fn sqrtf(v: f32) -> f32 {
    libm::sqrtf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn ceilf(v: f32) -> f32 {
    v.ceil()
}

#[cfg(not(feature = "std"))]
#[inline]
pub(crate) fn ceilf(v: f32) -> f32 {
    libm::ceilf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn floorf(v: f32) -> f32 {
    v.floor()
}

#[cfg(not(feature = "std"))]
#[inline]
pub(crate) fn floorf(v: f32) -> f32 {
    libm::floorf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn fabsf(v: f32) -> f32 {
    v.abs()
}

#[cfg(not(feature = "std"))]
#[inline]
pub(crate) fn fabsf(v: f32) -> f32 {
    libm::fabsf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn roundf(v: f32) -> f32 {
    v.round()
}

#[cfg(not(feature = "std"))]
#[inline]
pub(crate) fn roundf(v: f32) -> f32 {
    libm::roundf(v)
}
