//! Statistical odds properties for the round generator.
//!
//! Large-sample simulation asserting the deliberate design invariant that
//! real-stakes odds pay strictly less than practice odds.

use crate::flight::compound;
use crate::generator::{GeneratorConfig, RoundGenerator};
use crate::rng::round_rng;
use skymultiplier_types::{Mode, ONE_X_BPS};

const TRIALS: usize = 100_000;

#[derive(Default)]
struct Stats {
    trials: u64,
    total: f64,
}

impl Stats {
    fn add(&mut self, cumulative: f64) {
        self.trials += 1;
        self.total += cumulative;
    }

    fn mean(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.total / self.trials as f64
        }
    }
}

/// Mean cumulative multiplier across simulated full flights (no cash-out):
/// every zone compounds, floored exactly as the flight machine floors.
fn mean_cumulative(mode: Mode, table_seed: u64) -> f64 {
    let mut generator = RoundGenerator::new(GeneratorConfig::default()).expect("valid defaults");
    let mut stats = Stats::default();
    for trial in 0..TRIALS {
        let mut rng = round_rng(table_seed, trial as u64);
        let zones = generator.generate(mode, &mut rng).expect("generate round");
        let mut cumulative = ONE_X_BPS;
        for zone in zones {
            cumulative = compound(cumulative, zone.multiplier_tenths);
        }
        stats.add(cumulative as f64 / ONE_X_BPS as f64);
    }
    stats.mean()
}

#[test]
fn test_real_mode_pays_strictly_less_than_practice() {
    let real = mean_cumulative(Mode::Real, 11);
    let practice = mean_cumulative(Mode::Practice, 13);

    // Practice compounds to well above even money while real mode sits
    // below it; require a wide gap so sampling noise cannot flip the result.
    assert!(
        real < practice * 0.5,
        "real mean {real:.3} not clearly below practice mean {practice:.3}"
    );
    assert!(real < 1.0, "real mode mean {real:.3} should favor the house");
    assert!(
        practice > 1.0,
        "practice mode mean {practice:.3} should feel generous"
    );
}

#[test]
fn test_full_flight_matches_direct_compounding() {
    // The flight machine and the direct product agree on the final
    // accumulator for complete (never cashed out) rounds.
    use crate::flight::{advance, launch};
    use skymultiplier_types::{Round, RoundStatus};

    let mut generator = RoundGenerator::new(GeneratorConfig::default()).expect("valid defaults");
    for trial in 0..200 {
        let mut rng = round_rng(17, trial);
        let zones = generator.generate(Mode::Real, &mut rng).expect("generate");

        let mut expected = ONE_X_BPS;
        for zone in &zones {
            expected = compound(expected, zone.multiplier_tenths);
        }

        let mut round = Round::new(trial, "sim".to_string(), Mode::Real, 1_000, zones);
        launch(&mut round).expect("launch");
        while round.status == RoundStatus::Active {
            advance(&mut round);
        }
        assert_eq!(round.status, RoundStatus::CrashedOut);
        assert_eq!(round.cumulative_bps, expected);
    }
}
