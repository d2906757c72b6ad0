//! Spectrum band remapping
//!
//! The engine can only analyze power-of-two band counts (and no fewer than
//! 64). Callers ask for any count up to 8192; the fetched bins are converted
//! to a bounded log scale and folded down to the requested resolution.
//!
//! The fold is area-weighted: raw bins are walked in order and accumulated
//! into the current output band; the bin that crosses a band boundary is
//! split between the closing band and the next one. The split fraction uses
//! `(band + 1) * step - (i - 1)` rather than the distance from the previous
//! boundary, and the normalized bands are hard-clipped to 1. Existing
//! visualizers are tuned against exactly this output.

use crate::engine::AudioEngine;
use crate::types::FftWindow;
use tracing::warn;

/// Largest band count a caller may request
pub const MAX_SPECTRUM_BANDS: usize = 8192;

/// Smallest band count the engine analysis can produce
pub const MIN_FETCH_BANDS: usize = 64;

/// Convert a raw magnitude to the bounded log scale used for display
#[inline]
pub fn db_scale(magnitude: f32) -> f32 {
    10.0 * (1.0 + magnitude.max(0.0)).log10() * 2.0
}

/// Number of bands fetched from the engine for a request of `bands`
pub fn fetch_band_count(bands: usize) -> usize {
    bands.next_power_of_two().max(MIN_FETCH_BANDS)
}

/// Fold `values` into `bands` output bands
///
/// `values.len()` must be at least `bands`. When the lengths match the values
/// are copied (clipped to 1).
pub fn fold_bands(values: &[f32], bands: usize) -> Vec<f32> {
    let mut output = vec![0.0f32; bands];
    if bands == 0 {
        return output;
    }

    if values.len() == bands {
        for (out, &value) in output.iter_mut().zip(values) {
            *out = value.min(1.0);
        }
        return output;
    }

    let step = values.len() as f32 / bands as f32;
    let last = bands - 1;
    let mut current = 0usize;

    for (i, &value) in values.iter().enumerate() {
        let boundary = (current + 1) as f32 * step;

        if i as f32 >= boundary {
            let fraction = boundary - (i as f32 - 1.0);
            output[current.min(last)] += fraction * value;
            current += 1;

            if current >= bands {
                warn!(
                    "Spectrum fold overflow: band {} >= {} bands, writing into last band",
                    current, bands
                );
            }

            output[current.min(last)] += (1.0 - fraction) * value;
        } else {
            output[current.min(last)] += value;
        }
    }

    // Each band accumulated roughly `step` bins; divide to get the mean.
    for band in &mut output {
        *band /= step;
        if *band > 1.0 {
            *band = 1.0;
        }
    }

    output
}

/// Fetch and remap the current spectrum to `requested` bands
///
/// Out-of-range requests never fail: counts above 8192 are clamped and
/// counts of zero or less return a single silent band.
pub fn analyze<E: AudioEngine + ?Sized>(engine: &E, requested: i32) -> Vec<f32> {
    if requested <= 0 {
        warn!(
            "Requested {} spectrum bands, using minimum of 1",
            requested
        );
        return vec![0.0];
    }

    let mut bands = requested as usize;
    if bands > MAX_SPECTRUM_BANDS {
        warn!(
            "Requested {} spectrum bands, using maximum of {}",
            bands, MAX_SPECTRUM_BANDS
        );
        bands = MAX_SPECTRUM_BANDS;
    }

    let fetch = fetch_band_count(bands);

    let mut raw = match engine.spectrum(fetch, FftWindow::Hann) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Spectrum unavailable: {}", e);
            return vec![0.0; bands];
        }
    };
    raw.resize(fetch, 0.0);

    let scaled: Vec<f32> = raw.iter().map(|&m| db_scale(m)).collect();
    fold_bands(&scaled, bands)
}
