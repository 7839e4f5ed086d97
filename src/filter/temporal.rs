//! Temporal stability filter.

use super::stats::StatBuffer;
use super::FilterConfig;
use crate::geometry::Roi;

/// Run one clipped, normalized frame through the averaging window.
///
/// `samples` holds normalized depths with `0.0` for "no data". Pixels outside
/// `roi` are neither accumulated nor output; their output is `0.0`.
pub(crate) fn apply(
    config: &FilterConfig,
    buffer: &mut StatBuffer,
    roi: &Roi,
    samples: &[f32],
    output: &mut [f32],
) {
    let width = buffer.width() as usize;
    output.fill(0.0);

    for y in roi.min_y..roi.max_y {
        let row = y as usize * width;
        for x in roi.min_x..roi.max_x {
            let index = row + x as usize;
            output[index] = filter_pixel(config, buffer, index, samples[index]);
        }
    }

    buffer.advance_slot();
}

fn filter_pixel(config: &FilterConfig, buffer: &mut StatBuffer, index: usize, sample: f32) -> f32 {
    if sample > 0.0 {
        let big_change = buffer
            .change_reference(index)
            .is_some_and(|mean| (sample - mean).abs() > config.big_change);
        if big_change {
            buffer.restart(index, sample);
        } else {
            buffer.replace_slot(index, sample);
        }
    } else {
        buffer.replace_slot(index, 0.0);
    }

    let stat = buffer.stat(index);
    if stat.is_stable(config.min_num_samples, config.max_variance) {
        if let Some(candidate) = stat.mean() {
            let current = buffer.valid_value(index);
            if !buffer.holds_stable_value(index)
                || (candidate - current).abs() >= config.hysteresis
            {
                buffer.set_valid_value(index, candidate);
            }
        }
    } else if !config.retain_valids {
        buffer.mark_instable(index, config.instable_value);
    }

    buffer.valid_value(index)
}
