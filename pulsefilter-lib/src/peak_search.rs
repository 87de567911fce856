//! Correlation based peak search
//!
//! Pulse candidates are found by cross-correlating a 
//! waveform segment with the reference pulse. Candidates
//! are cleaned in a second step by comparing the 
//! mean-subtracted segment with the mean-subtracted 
//! reference pulse, which makes the check sensitive to 
//! the shape and blind to the baseline.

use crate::errors::AnalysisError;
use crate::reference_pulse::ReferencePulse;

/// Cross-correlation in "valid" mode.
///
/// The output has `samples.len() - kernel.len() + 1` 
/// entries, or none if the kernel does not fit.
pub fn correlate(samples : &[f64], kernel : &[f64]) -> Vec<f64> {
  if kernel.is_empty() || samples.len() < kernel.len() {
    return Vec::<f64>::new();
  }
  samples.windows(kernel.len())
         .map(|w| w.iter().zip(kernel).map(|(s,k)| s*k).sum())
         .collect()
}

/// Raise every value below the threshold to exactly 
/// the threshold
pub fn clamp_below(correlation : &mut [f64], threshold : f64) {
  for c in correlation.iter_mut() {
    if *c < threshold {
      *c = threshold;
    }
  }
}

/// Index of the first maximum
fn argmax(values : &[f64]) -> usize {
  let mut max_idx = 0usize;
  for k in 1..values.len() {
    if values[k] > values[max_idx] {
      max_idx = k;
    }
  }
  max_idx
}

/// Largest absolute voltage within a segment
pub fn peak_amplitude(segment : &[f64]) -> f64 {
  segment.iter().fold(0.0, |acc, v| f64::max(acc, v.abs()))
}

/// Find the sample index within `[lo, hi)` where the 
/// reference pulse matches best.
///
/// Correlation values below the raw threshold are set to
/// the threshold, so without any pulse the result is the
/// start of the window. 
///
/// # Returns
///
/// (peak index, largest absolute voltage within 
///  the pulse length after the peak index)
pub fn find_peak(samples : &[f64],
                 lo      : usize,
                 hi      : usize,
                 pulse   : &ReferencePulse)
  -> Result<(usize, f64), AnalysisError> {
  if hi > samples.len() {
    return Err(AnalysisError::OutOfRangeUpperBound);
  }
  if hi < lo || hi - lo < pulse.len() {
    return Err(AnalysisError::WindowTooShort);
  }
  let mut correlation = correlate(&samples[lo..hi], pulse.kernel());
  clamp_below(&mut correlation, pulse.raw_threshold());
  let peak = lo + argmax(&correlation);
  let amplitude = peak_amplitude(&samples[peak..peak + pulse.len()]);
  Ok((peak, amplitude))
}

/// Compare the segment starting at `window_start` with the
/// reference pulse after subtracting both means.
///
/// # Returns
///
/// (passed, largest absolute voltage of the segment)
pub fn check_shape(samples      : &[f64],
                   window_start : usize,
                   pulse        : &ReferencePulse)
  -> Result<(bool, f64), AnalysisError> {
  let window_end = window_start + pulse.len();
  if window_end > samples.len() {
    return Err(AnalysisError::OutOfRangeUpperBound);
  }
  let segment = &samples[window_start..window_end];
  let mean    = segment.iter().sum::<f64>()/(segment.len() as f64);
  let score : f64 = segment.iter()
                           .zip(pulse.zero_normalized())
                           .map(|(s,k)| (s - mean)*k)
                           .sum();
  Ok((score > pulse.shape_threshold(), peak_amplitude(segment)))
}

/// Indices of all samples which are strictly larger
/// than both of their neighbours. The first and the last
/// sample are never maxima.
pub fn local_maxima(signal : &[f64]) -> Vec<usize> {
  let mut maxima = Vec::<usize>::new();
  if signal.len() < 3 {
    return maxima;
  }
  for k in 1..signal.len() - 1 {
    if signal[k] > signal[k-1] && signal[k] > signal[k+1] {
      maxima.push(k);
    }
  }
  maxima
}
