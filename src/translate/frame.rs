//! Dense fixed-step frames from sparse backend matrices.
//!
//! The backend returns only the timestamps it has samples for; Graphite
//! consumers expect a gap-free grid aligned to the request window. The two
//! stages here are NaN fill over the sample span and realignment of that
//! span to the `[start, stop]` grid of the request.

/// Default point budget when a request carries none. Such requests come
/// from scripts rather than dashboards.
pub const DEFAULT_MAX_DATA_POINTS: i64 = 1024;

/// A dense fixed-step series: `values.len() == (stop - start) / step + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
    pub values: Vec<f64>,
}

/// Pick the query step: the smallest multiple of the ingest flush interval
/// that keeps the point count within budget, floored at one interval.
/// Steps off the flush cadence beat against the rollup window and jitter.
pub fn select_step(start: i64, stop: i64, max_data_points: i64, flush_interval: f64) -> i64 {
    let max_data_points = if max_data_points == 0 {
        DEFAULT_MAX_DATA_POINTS
    } else {
        max_data_points
    } as f64;
    let time_range = (stop - start) as f64;
    let multiple = (time_range / max_data_points / flush_interval).ceil() * flush_interval;
    multiple.max(flush_interval) as i64
}

/// Expand sparse `(timestamp, value)` samples into a NaN-filled grid
/// spanning the first to the last sample.
///
/// The walk never advances the sample cursor past a missed tick: if the
/// next unconsumed sample does not sit on the expected timestamp, the tick
/// stays NaN and the same sample is reconsidered at the next one. Duplicate
/// timestamps collapse to the last value.
///
/// Callers must pass at least one sample.
pub fn fill_dense(samples: &[(f64, f64)], step: i64) -> Frame {
    let start = samples[0].0;
    let stop = samples[samples.len() - 1].0;
    let step_secs = step as f64;
    let ticks = ((stop - start) / step_secs) as usize + 1;

    let mut values = vec![f64::NAN; ticks];
    let mut cursor = 0;
    for (i, slot) in values.iter_mut().enumerate() {
        while cursor < samples.len() {
            if start + (i as f64) * step_secs != samples[cursor].0 {
                break;
            }
            *slot = samples[cursor].1;
            cursor += 1;
        }
    }

    Frame {
        start: start as i64,
        stop: stop as i64,
        step,
        values,
    }
}

/// Clip or pad a frame so it covers exactly the request window, anchored
/// to the request start. Without this the point-count division downstream
/// in carbonapi goes wrong.
pub fn align_to_request(mut frame: Frame, request_start: i64, request_stop: i64) -> Frame {
    let step = frame.step;

    if frame.start < request_start {
        let lead = ceil_div(request_start - frame.start, step);
        frame.start += lead * step;
        let lead = (lead as usize).min(frame.values.len());
        frame.values.drain(..lead);
    } else {
        // Shift down to the largest request_start + k*step <= start so the
        // grid stays anchored to the request.
        let lead = (frame.start - request_start) / step;
        frame.start -= lead * step;
        let mut values = vec![f64::NAN; lead as usize];
        values.append(&mut frame.values);
        frame.values = values;
    }

    if frame.stop > request_stop {
        let trail = ceil_div(frame.stop - request_stop, step);
        frame.stop -= trail * step;
        let keep = frame.values.len().saturating_sub(trail as usize);
        frame.values.truncate(keep);
    } else {
        let want = ((request_stop - request_start) / step + 1) as usize;
        let missing = want.saturating_sub(frame.values.len());
        frame.stop += missing as i64 * step;
        frame.values.extend(std::iter::repeat(f64::NAN).take(missing));
    }

    frame
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_window_invariant(frame: &Frame, request_start: i64, request_stop: i64) {
        assert_eq!(
            frame.values.len() as i64,
            (frame.stop - frame.start) / frame.step + 1
        );
        assert_eq!(frame.start % frame.step, request_start % frame.step);
        assert_eq!(frame.stop % frame.step, request_stop % frame.step);
    }

    #[test]
    fn step_is_a_flush_multiple() {
        // 1h at <=1024 points with a 10s flush lands on the 10s floor.
        assert_eq!(select_step(0, 3600, 1024, 10.0), 10);
        // 1 week at <=1024 points: raw 59.06 -> ceil -> 6 intervals.
        assert_eq!(select_step(0, 604800, 1024, 10.0), 600);
        // Zero budget falls back to the 1024 default.
        assert_eq!(select_step(0, 604800, 0, 10.0), 600);
        // Tiny ranges never go below one interval.
        assert_eq!(select_step(0, 10, 1024, 10.0), 10);
    }

    #[test]
    fn fill_bridges_gaps_with_nan() {
        let samples = [(100.0, 1.0), (120.0, 2.0), (160.0, 4.0)];
        let frame = fill_dense(&samples, 20);
        assert_eq!(frame.start, 100);
        assert_eq!(frame.stop, 160);
        assert_eq!(frame.values.len(), 4);
        assert_eq!(frame.values[0], 1.0);
        assert_eq!(frame.values[1], 2.0);
        assert!(frame.values[2].is_nan());
        assert_eq!(frame.values[3], 4.0);
    }

    #[test]
    fn fill_keeps_last_duplicate() {
        let samples = [(100.0, 1.0), (100.0, 9.0), (120.0, 2.0)];
        let frame = fill_dense(&samples, 20);
        assert_eq!(frame.values, vec![9.0, 2.0]);
    }

    #[test]
    fn align_trims_early_samples() {
        // Samples reach back before the request start.
        let frame = fill_dense(&[(80.0, 1.0), (100.0, 2.0), (120.0, 3.0)], 20);
        let aligned = align_to_request(frame, 100, 120);
        assert_eq!(aligned.start, 100);
        assert_eq!(aligned.stop, 120);
        assert_eq!(aligned.values, vec![2.0, 3.0]);
        assert_window_invariant(&aligned, 100, 120);
    }

    #[test]
    fn align_pads_late_start() {
        // First sample arrives two steps into the request window.
        let frame = fill_dense(&[(140.0, 7.0)], 20);
        let aligned = align_to_request(frame, 100, 160);
        assert_eq!(aligned.start, 100);
        assert_eq!(aligned.stop, 160);
        assert_eq!(aligned.values.len(), 4);
        assert!(aligned.values[0].is_nan());
        assert!(aligned.values[1].is_nan());
        assert_eq!(aligned.values[2], 7.0);
        assert!(aligned.values[3].is_nan());
        assert_window_invariant(&aligned, 100, 160);
    }

    #[test]
    fn align_trims_trailing_samples() {
        let frame = fill_dense(&[(100.0, 1.0), (120.0, 2.0), (140.0, 3.0)], 20);
        let aligned = align_to_request(frame, 100, 120);
        assert_eq!(aligned.values, vec![1.0, 2.0]);
        assert_window_invariant(&aligned, 100, 120);
    }

    #[test]
    fn align_pads_short_tail() {
        let frame = fill_dense(&[(100.0, 1.0)], 20);
        let aligned = align_to_request(frame, 100, 180);
        assert_eq!(aligned.values.len(), 5);
        assert_eq!(aligned.values[0], 1.0);
        assert!(aligned.values[1..].iter().all(|v| v.is_nan()));
        assert_window_invariant(&aligned, 100, 180);
    }

    #[test]
    fn align_exact_window_is_identity() {
        let frame = fill_dense(&[(100.0, 1.0), (120.0, 2.0)], 20);
        let aligned = align_to_request(frame.clone(), 100, 120);
        assert_eq!(aligned, frame);
    }
}
