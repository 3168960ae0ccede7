//! Streak tracking: per-dimension momentum counters.
//!
//! A "progress" verdict moves a counter up by one, "degrade" moves it down
//! by one, and "constant" leaves it alone so momentum survives noisy
//! classifier output. Once a counter's magnitude reaches [`THRESHOLD`] the
//! engine fires a threshold action for that dimension and resets it.

use crate::garden::{Dimension, PerDimension, Polarity, StreakCounters, Verdicts};

/// Streak magnitude that triggers a health transfer between a dimension's plants.
pub const THRESHOLD: i64 = 2;

/// Apply one cycle's verdicts to `counters` and return the per-dimension deltas.
pub fn apply(counters: &mut StreakCounters, verdicts: &Verdicts) -> PerDimension<i64> {
    let deltas = verdicts.map(|_, verdict| verdict.streak_delta());
    for (dimension, delta) in deltas.iter() {
        *counters.get_mut(dimension) += *delta;
    }
    deltas
}

/// Set a dimension's counter to exactly zero.
pub fn reset(counters: &mut StreakCounters, dimension: Dimension) {
    *counters.get_mut(dimension) = 0;
}

/// The polarity favoured by a counter that has reached the threshold, if any.
pub fn crossed(value: i64) -> Option<Polarity> {
    if value >= THRESHOLD {
        Some(Polarity::Good)
    } else if value <= -THRESHOLD {
        Some(Polarity::Bad)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garden::Verdict;

    fn verdicts(food: Verdict, health: Verdict, toxic: Verdict) -> Verdicts {
        Verdicts {
            food,
            health,
            toxic,
        }
    }

    #[test]
    fn apply_moves_each_dimension_independently() {
        let mut counters = StreakCounters {
            food: 1,
            health: 0,
            toxic: -1,
        };
        let deltas = apply(
            &mut counters,
            &verdicts(Verdict::Progress, Verdict::Constant, Verdict::Degrade),
        );

        assert_eq!(
            deltas,
            PerDimension {
                food: 1,
                health: 0,
                toxic: -1
            }
        );
        assert_eq!(
            counters,
            StreakCounters {
                food: 2,
                health: 0,
                toxic: -2
            }
        );
    }

    #[test]
    fn constant_leaves_counter_unchanged() {
        let mut counters = StreakCounters {
            food: -1,
            health: 1,
            toxic: 0,
        };
        apply(
            &mut counters,
            &verdicts(Verdict::Constant, Verdict::Constant, Verdict::Constant),
        );
        assert_eq!(
            counters,
            StreakCounters {
                food: -1,
                health: 1,
                toxic: 0
            }
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let mut counters = StreakCounters {
            food: 3,
            health: 0,
            toxic: 0,
        };
        reset(&mut counters, Dimension::Food);
        assert_eq!(counters.food, 0);
        reset(&mut counters, Dimension::Food);
        assert_eq!(counters.food, 0);
    }

    #[test]
    fn crossed_respects_threshold_in_both_directions() {
        assert_eq!(crossed(0), None);
        assert_eq!(crossed(1), None);
        assert_eq!(crossed(-1), None);
        assert_eq!(crossed(THRESHOLD), Some(Polarity::Good));
        assert_eq!(crossed(THRESHOLD + 3), Some(Polarity::Good));
        assert_eq!(crossed(-THRESHOLD), Some(Polarity::Bad));
    }
}
