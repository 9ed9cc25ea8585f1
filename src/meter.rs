//! Output level metering.

/// Snapshot of the master meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterReadings {
    pub peak_l: f32,
    pub peak_r: f32,
    pub max_peak_l: f32,
    pub max_peak_r: f32,
    pub rms_l: f32,
    pub rms_r: f32,
    /// Latched once any sample exceeds full scale.
    pub clipped_l: bool,
    pub clipped_r: bool,
}

pub struct Meters {
    readings: MeterReadings,
    part_peaks: Vec<f32>,
}

impl Meters {
    pub fn new(parts: usize) -> Self {
        Self {
            readings: MeterReadings::default(),
            part_peaks: vec![0.0; parts],
        }
    }

    #[inline]
    pub fn readings(&self) -> MeterReadings {
        self.readings
    }

    pub fn part_peak(&self, part: usize) -> f32 {
        self.part_peaks.get(part).copied().unwrap_or(0.0)
    }

    pub(crate) fn set_part_peak(&mut self, part: usize, peak: f32) {
        if let Some(p) = self.part_peaks.get_mut(part) {
            *p = peak;
        }
    }

    /// Update from one block of master output.
    pub(crate) fn measure(&mut self, left: &[f32], right: &[f32]) {
        let (peak_l, rms_l) = levels(left);
        let (peak_r, rms_r) = levels(right);
        let m = &mut self.readings;
        m.peak_l = peak_l;
        m.peak_r = peak_r;
        m.max_peak_l = m.max_peak_l.max(peak_l);
        m.max_peak_r = m.max_peak_r.max(peak_r);
        m.rms_l = rms_l;
        m.rms_r = rms_r;
        m.clipped_l |= peak_l > 1.0;
        m.clipped_r |= peak_r > 1.0;
    }

    pub fn reset(&mut self) {
        self.readings = MeterReadings::default();
        self.part_peaks.iter_mut().for_each(|p| *p = 0.0);
    }
}

fn levels(buffer: &[f32]) -> (f32, f32) {
    if buffer.is_empty() {
        return (0.0, 0.0);
    }
    let (peak, sum) = buffer
        .iter()
        .fold((0f32, 0f32), |(peak, sum), s| (peak.max(s.abs()), sum + s * s));
    (peak, (sum / buffer.len() as f32).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peaks_and_clipping() {
        let mut meters = Meters::new(2);
        meters.measure(&[0.5, -0.8], &[1.5, 0.0]);
        let r = meters.readings();
        assert_eq!(r.peak_l, 0.8);
        assert_eq!(r.peak_r, 1.5);
        assert!(!r.clipped_l);
        assert!(r.clipped_r);

        meters.measure(&[0.1, 0.1], &[0.0, 0.0]);
        let r = meters.readings();
        assert_eq!(r.peak_l, 0.1);
        assert_eq!(r.max_peak_l, 0.8);
        assert!(r.clipped_r);
    }

    #[test]
    fn rms_of_constant() {
        let mut meters = Meters::new(0);
        meters.measure(&[0.5; 16], &[-0.5; 16]);
        assert!((meters.readings().rms_l - 0.5).abs() < 1e-6);
        assert!((meters.readings().rms_r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_everything() {
        let mut meters = Meters::new(2);
        meters.measure(&[2.0], &[2.0]);
        meters.set_part_peak(1, 0.7);
        meters.reset();
        assert_eq!(meters.readings(), MeterReadings::default());
        assert_eq!(meters.part_peak(1), 0.0);
    }
}
