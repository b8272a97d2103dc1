use serde::{Deserialize, Serialize};

/// A point in session time seen through both clocks the engine works with.
///
/// `elapsed_ms` is the session stopwatch (what the user sees, what formatted
/// `MM:SS.cc` strings are built from). `wall_ms` is the Unix-millisecond clock
/// that stamps samples, so buffer slicing always uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Moment {
    pub elapsed_ms: u64,
    pub wall_ms: i64,
}

impl Moment {
    pub fn new(elapsed_ms: u64, wall_ms: i64) -> Self {
        Self {
            elapsed_ms,
            wall_ms,
        }
    }

    /// The moment `wall_ms` expressed against this one, moving the stopwatch by
    /// the same delta. The stopwatch never goes below zero.
    pub fn at_wall(&self, wall_ms: i64) -> Moment {
        let delta = wall_ms - self.wall_ms;
        let elapsed_ms = if delta >= 0 {
            self.elapsed_ms.saturating_add(delta as u64)
        } else {
            self.elapsed_ms.saturating_sub(delta.unsigned_abs())
        };
        Moment {
            elapsed_ms,
            wall_ms,
        }
    }

    pub fn later(&self, ms: u64) -> Moment {
        self.at_wall(self.wall_ms.saturating_add(ms as i64))
    }

    pub fn earlier(&self, ms: u64) -> Moment {
        self.at_wall(self.wall_ms.saturating_sub(ms as i64))
    }
}

/// Formats a stopwatch value as `MM:SS.cc` (centiseconds).
pub fn format_elapsed(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let centis = (ms % 1000) / 10;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_seconds_and_centiseconds() {
        assert_eq!(format_elapsed(0), "00:00.00");
        assert_eq!(format_elapsed(5_000), "00:05.00");
        assert_eq!(format_elapsed(61_234), "01:01.23");
        assert_eq!(format_elapsed(6_000_999), "100:00.99");
    }

    #[test]
    fn shifting_moves_both_clocks_together() {
        let click = Moment::new(8_000, 1_700_000_008_000);
        let before = click.earlier(5_000);
        assert_eq!(before, Moment::new(3_000, 1_700_000_003_000));
        let after = click.later(5_000);
        assert_eq!(after, Moment::new(13_000, 1_700_000_013_000));
    }

    #[test]
    fn stopwatch_saturates_at_zero() {
        let click = Moment::new(2_000, 10_000);
        let before = click.earlier(5_000);
        assert_eq!(before.elapsed_ms, 0);
        assert_eq!(before.wall_ms, 5_000);
    }
}
