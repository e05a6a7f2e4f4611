//! Envelope segmentation and (speed, threshold) grid search
//!
//! Thresholds the narrow-band envelope into ON/OFF intervals, types
//! them as dots, dashes and gap classes, and scores how well the
//! interval lengths fit the Morse 1/3/7 grid. A two-pass search over
//! speed and threshold picks the best-fitting pair: a coarse sweep
//! (speed step 10, threshold step 20) followed by a refinement with
//! unit speed step and threshold step 2 around the rolling estimates,
//! so the estimate converges onto off-grid speeds over successive
//! frames.

use crate::constants::{dot_len_ms, BASE_SAMPLE_RATE};

const SPEED_SLOTS: usize = 55;
const LEVEL_SLOTS: usize = 101;

/// Classification of one run-length interval.
///
/// ON intervals are dots or dashes. OFF intervals start out open and
/// are assigned the nearest of the 1/3/7-unit gap classes when shorter
/// than 8 dot units; longer silence stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalKind {
    #[default]
    Dot,
    Dash,
    OpenGap,
    ElementGap,
    LetterGap,
    WordGap,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Interval {
    pub on: bool,
    pub start: i32,
    pub end: i32,
    pub avg: f32,
    pub len: f32,
    pub kind: IntervalKind,
}

#[derive(Debug, Clone, Copy)]
pub struct Segmentation {
    pub speed_idx: usize,
    pub level_idx: usize,
    pub cost: f32,
}

pub struct Segmenter {
    intervals: Vec<Vec<Vec<Interval>>>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        let mut intervals = Vec::with_capacity(SPEED_SLOTS);
        for _ in 0..SPEED_SLOTS {
            let mut row = Vec::with_capacity(LEVEL_SLOTS);
            for _ in 0..LEVEL_SLOTS {
                row.push(Vec::with_capacity(100));
            }
            intervals.push(row);
        }
        Segmenter { intervals }
    }

    /// The interval sequence computed for a given grid cell.
    pub fn intervals(&self, speed_idx: usize, level_idx: usize) -> &[Interval] {
        &self.intervals[speed_idx][level_idx]
    }

    /// Search the (speed, threshold) grid for the segmentation that
    /// best fits the envelope.
    ///
    /// `mean` is the overall mean envelope level; thresholds are
    /// percentages of it. A positive `pinned_speed_wpm` restricts the
    /// search to that speed and skips the refinement pass.
    /// `prev_speed_wpm`/`prev_threshold` are the previous frame's
    /// estimates, which anchor the refinement pass.
    pub fn analyze(
        &mut self,
        envelope: &[f32],
        mean: f64,
        n_downsample: usize,
        pinned_speed_wpm: f32,
        prev_speed_wpm: f32,
        prev_threshold: f32,
    ) -> Segmentation {
        let mut best = Segmentation {
            speed_idx: 0,
            level_idx: 0,
            cost: 1e6,
        };

        let mut s0: i32 = 0;
        let mut s1: i32 = 50;
        let mut ds: i32 = 10;
        let mut n_modes = 2;

        if pinned_speed_wpm > 0.0 && pinned_speed_wpm < 100.0 {
            s0 = (pinned_speed_wpm - 5.0).round() as i32;
            s1 = s0;
            n_modes = 1;
        }

        for mode in 0..n_modes {
            let (l0, l1, dl) = if mode == 0 {
                (10i32, 90i32, 20i32)
            } else {
                s0 = (prev_speed_wpm - 5.0 - 2.0).round().clamp(0.0, 50.0) as i32;
                s1 = (prev_speed_wpm - 5.0 + 2.0).round().clamp(0.0, 50.0) as i32;
                ds = 1;
                let l_old = (100.0 * prev_threshold).clamp(20.0, 80.0) as i32;
                (l_old - 10, l_old + 10, 2)
            };

            let mut s = s0;
            while s <= s1 && s < 55 {
                let lendot_samples = (BASE_SAMPLE_RATE as f64
                    * (1e-3 * dot_len_ms((5 + s) as f32) as f64)
                    / n_downsample as f64) as f32;

                let mut l = l0;
                while l <= l1 {
                    let cost =
                        self.evaluate(envelope, mean, lendot_samples, s as usize, l as usize);

                    if cost < best.cost {
                        best = Segmentation {
                            speed_idx: s as usize,
                            level_idx: l as usize,
                            cost,
                        };
                    }

                    l += dl;
                }
                s += ds;
            }
        }

        best
    }

    /// Segment the envelope at one (speed, threshold) cell and return
    /// the fit cost. The interval sequence is kept for the caller.
    fn evaluate(
        &mut self,
        envelope: &[f32],
        mean: f64,
        lendot_samples: f32,
        speed_idx: usize,
        level_idx: usize,
    ) -> f32 {
        let n_samples = envelope.len();
        let level = ((0.01 * mean) * level_idx as f64) as f32;

        let intervals = &mut self.intervals[speed_idx][level_idx];
        intervals.clear();

        // threshold into run-length intervals
        let mut last_signal = envelope[0] > level;
        let mut cur = Interval {
            on: last_signal,
            start: 0,
            avg: envelope[0],
            ..Interval::default()
        };

        for (i, &e) in envelope.iter().enumerate().skip(1) {
            let cur_signal = e > level;
            if cur_signal != last_signal {
                cur.end = i as i32;
                cur.avg /= (i as i32 - cur.start) as f32;
                cur.len = (cur.end - cur.start) as f32 / lendot_samples;
                intervals.push(cur);

                cur.on = cur_signal;
                cur.start = i as i32;
                cur.avg = e;
                last_signal = cur_signal;
            } else {
                cur.avg += e;
            }
        }
        cur.end = n_samples as i32;
        intervals.push(cur);

        let n_intervals = intervals.len();

        for iv in intervals.iter_mut() {
            if !iv.on {
                iv.kind = IntervalKind::OpenGap;
            } else {
                iv.kind = if iv.len > 2.0 {
                    IntervalKind::Dash
                } else {
                    IntervalKind::Dot
                };
            }
        }

        // dot/dash length statistics; the partial first and last
        // intervals are excluded
        let mut n_dots = 0;
        let mut avg_dot_length = 0.0f32;
        let mut n_dahs = 0;
        let mut avg_dah_length = 0.0f32;

        for iv in intervals.iter().take(n_intervals.saturating_sub(1)).skip(1) {
            if !iv.on {
                continue;
            }
            match iv.kind {
                IntervalKind::Dot => {
                    n_dots += 1;
                    avg_dot_length += iv.len;
                }
                IntervalKind::Dash => {
                    n_dahs += 1;
                    avg_dah_length += iv.len;
                }
                _ => {}
            }
        }

        if n_dots > 0 {
            avg_dot_length /= n_dots as f32;
        } else {
            avg_dot_length = 1.0;
        }
        if n_dahs > 0 {
            avg_dah_length /= n_dahs as f32;
        } else {
            avg_dah_length = 3.0;
        }

        // renormalize keyed lengths toward their nominal units and
        // recentre the boundaries so neighbouring gaps stay abutting
        for i in 1..n_intervals.saturating_sub(1) {
            if !intervals[i].on {
                continue;
            }

            let mid = 0.5 * (intervals[i].start + intervals[i].end) as f32;
            if intervals[i].kind == IntervalKind::Dot {
                intervals[i].len *= 1.0 / avg_dot_length;
            } else {
                intervals[i].len *= 3.0 / avg_dah_length;
            }

            let new_start = (mid - 0.5 * intervals[i].len * lendot_samples) as i32;
            intervals[i].start = new_start;
            intervals[i - 1].end = new_start;
            intervals[i - 1].len =
                (intervals[i - 1].end - intervals[i - 1].start) as f32 / lendot_samples;

            let new_end = (mid + 0.5 * intervals[i].len * lendot_samples) as i32;
            intervals[i].end = new_end;
            intervals[i + 1].start = new_end;
            intervals[i + 1].len =
                (intervals[i + 1].end - intervals[i + 1].start) as f32 / lendot_samples;
        }

        // classify gaps and accumulate the fit cost
        let mut n_dots = 0;
        let mut cost_dots = 0.0f32;
        let mut n_dahs = 0;
        let mut cost_dahs = 0.0f32;
        let mut n_spaces = 0;
        let mut cost_spaces = 0.0f32;

        for i in 1..n_intervals.saturating_sub(1) {
            let iv = &mut intervals[i];
            if !iv.on {
                iv.kind = IntervalKind::OpenGap;

                if iv.len < 8.0 {
                    let c1 = (iv.len as f64 - 1.0).powi(2) as f32;
                    let c3 = (iv.len as f64 - 3.0).powi(2) as f32;
                    let c7 = (iv.len as f64 - 7.0).powi(2) as f32;

                    if c1 < c3 && c1 < c7 {
                        iv.kind = IntervalKind::ElementGap;
                        cost_spaces += c1.min(c3).min(c7);
                        n_spaces += 1;
                    } else if c3 < c1 && c3 < c7 {
                        iv.kind = IntervalKind::LetterGap;
                    } else if c7 < c1 && c7 < c3 {
                        iv.kind = IntervalKind::WordGap;
                    }
                }
                continue;
            }

            match iv.kind {
                IntervalKind::Dot => {
                    n_dots += 1;
                    cost_dots += (iv.len as f64 - 1.0).powi(2) as f32;
                }
                IntervalKind::Dash => {
                    n_dahs += 1;
                    cost_dahs += (iv.len as f64 - 3.0).powi(2) as f32;
                }
                _ => {}
            }
        }

        if n_spaces == 0 {
            n_spaces = 1;
            cost_spaces = 100.0;
        }
        if n_dots < 1 {
            n_dots = 1;
            cost_dots = 100.0;
        }
        if n_dahs < 1 {
            n_dahs = 1;
            cost_dahs = 100.0;
        }

        let mut cost =
            cost_dots / n_dots as f32 + cost_dahs / n_dahs as f32 + cost_spaces / n_spaces as f32;

        let ratio = avg_dah_length / avg_dot_length;
        if !(2.5..=3.5).contains(&ratio) {
            cost += 100.0;
        }

        cost
    }
}
