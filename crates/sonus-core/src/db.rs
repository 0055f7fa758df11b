//! Decibel conversions shared by the loudness and peak meters.

/// ITU-R BS.1770 calibration offset applied after power averaging.
pub const LUFS_OFFSET: f64 = -0.691;

/// Mean-square power to LUFS. Zero power maps to negative infinity.
#[inline]
pub fn power_to_lufs(power: f64) -> f64 {
    if power > 0.0 {
        LUFS_OFFSET + 10.0 * power.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// LUFS back to mean-square power. Negative infinity maps to zero.
#[inline]
pub fn lufs_to_power(lufs: f64) -> f64 {
    if lufs == f64::NEG_INFINITY {
        0.0
    } else {
        10f64.powf((lufs - LUFS_OFFSET) / 10.0)
    }
}

/// Linear amplitude to dB (e.g. dBTP). Zero maps to negative infinity.
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f64::NEG_INFINITY
    }
}

#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Power mean of a set of LUFS values, returned in LUFS.
///
/// Silent (`-inf`) entries contribute zero power. An empty set is `-inf`.
pub fn power_mean_lufs<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if v.is_nan() {
            continue;
        }
        sum += lufs_to_power(v);
        count += 1;
    }
    if count == 0 {
        return f64::NEG_INFINITY;
    }
    power_to_lufs(sum / count as f64)
}
