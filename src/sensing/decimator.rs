/// Keeps every Nth native motion event to approach a target sampling rate.
///
/// The ratio is fixed when the session starts; a new target rate only takes
/// effect on the next session.
#[derive(Debug, Clone)]
pub struct Decimator {
    ratio: u32,
    seen: u64,
    kept: u64,
}

impl Decimator {
    pub fn new(native_rate_hz: f64, target_rate_hz: u32) -> Self {
        Self {
            ratio: ratio_for(native_rate_hz, target_rate_hz),
            seen: 0,
            kept: 0,
        }
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Counts the event and reports whether it should be kept.
    pub fn accept(&mut self) -> bool {
        self.seen += 1;
        let keep = self.seen % u64::from(self.ratio) == 0;
        if keep {
            self.kept += 1;
        }
        keep
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn kept(&self) -> u64 {
        self.kept
    }
}

/// `round(native / target)`, never below 1.
pub fn ratio_for(native_rate_hz: f64, target_rate_hz: u32) -> u32 {
    if target_rate_hz == 0 || !native_rate_hz.is_finite() || native_rate_hz <= 0.0 {
        return 1;
    }
    let ratio = (native_rate_hz / f64::from(target_rate_hz)).round();
    if ratio < 1.0 {
        1
    } else {
        ratio as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_hertz_to_two_hertz_keeps_one_in_fifteen() {
        let mut decimator = Decimator::new(30.0, 2);
        assert_eq!(decimator.ratio(), 15);

        let kept = (0..150).filter(|_| decimator.accept()).count();
        assert_eq!(kept, 10);
        assert_eq!(decimator.seen(), 150);
        assert_eq!(decimator.kept(), 10);
    }

    #[test]
    fn the_nth_event_is_the_first_kept() {
        let mut decimator = Decimator::new(30.0, 4);
        assert_eq!(decimator.ratio(), 8);
        let decisions: Vec<bool> = (0..8).map(|_| decimator.accept()).collect();
        assert_eq!(decisions.iter().filter(|k| **k).count(), 1);
        assert!(decisions[7]);
    }

    #[test]
    fn degenerate_rates_keep_everything() {
        assert_eq!(ratio_for(30.0, 0), 1);
        assert_eq!(ratio_for(1.0, 4), 1);
        assert_eq!(ratio_for(f64::NAN, 2), 1);
    }
}
