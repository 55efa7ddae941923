//! Round generation: tiered odds tables and zone sequences.
//!
//! A round is six zones at fixed, equally spaced positions; each zone's
//! multiplier is drawn independently from a four-tier odds table selected by
//! mode. Practice tables are tuned to feel generous; real tables carry a
//! majority-losing tier so the expected cumulative multiplier stays below
//! practice mode (verified statistically in `house_edge_tests`).

use rand::Rng;
use skymultiplier_types::{zone_position_tenths, Mode, Zone, ZONES_PER_ROUND};
use thiserror::Error as ThisError;

/// Tier weights are expressed in basis points and must sum to this scale.
pub const WEIGHT_SCALE_BPS: u32 = 10_000;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum GenerationError {
    #[error("invalid odds table: {0}")]
    InvalidOddsTable(&'static str),
    #[error("invalid jackpot policy: {0}")]
    InvalidJackpotPolicy(&'static str),
    /// The randomness source could not produce a draw.
    #[error("randomness source unavailable")]
    RandomnessUnavailable,
}

/// One multiplier tier: an inclusive range of one-decimal multipliers
/// (stored as tenths) drawn with the given weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tier {
    pub lo_tenths: u32,
    pub hi_tenths: u32,
    pub weight_bps: u32,
}

impl Tier {
    pub const fn new(lo_tenths: u32, hi_tenths: u32, weight_bps: u32) -> Self {
        Self {
            lo_tenths,
            hi_tenths,
            weight_bps,
        }
    }
}

/// Four-tier odds table, ordered top tier first (jackpot/big down to the
/// losing tier).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OddsTable {
    pub tiers: [Tier; 4],
}

/// Index of the jackpot tier within a table.
pub const JACKPOT_TIER: usize = 0;
/// Index of the low/losing tier within a table.
pub const LOW_TIER: usize = 3;

impl OddsTable {
    /// Practice odds: jackpot [10.0,49.9], rare [4.4,9.9], winning [1.5,4.3],
    /// losing [0.5,1.4].
    pub fn practice_default() -> Self {
        Self {
            tiers: [
                Tier::new(100, 499, 100),
                Tier::new(44, 99, 400),
                Tier::new(15, 43, 3_500),
                Tier::new(5, 14, 6_000),
            ],
        }
    }

    /// Real-stakes odds: big [4.1,7.9], decent [2.1,3.9], small profit
    /// [1.3,1.9], and a majority losing tier [0.5,1.1].
    pub fn real_default() -> Self {
        Self {
            tiers: [
                Tier::new(41, 79, 100),
                Tier::new(21, 39, 300),
                Tier::new(13, 19, 800),
                Tier::new(5, 11, 8_800),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        let mut total: u32 = 0;
        for tier in &self.tiers {
            if tier.lo_tenths == 0 {
                return Err(GenerationError::InvalidOddsTable(
                    "multipliers must be positive",
                ));
            }
            if tier.lo_tenths > tier.hi_tenths {
                return Err(GenerationError::InvalidOddsTable("empty tier range"));
            }
            total = total.saturating_add(tier.weight_bps);
        }
        if total != WEIGHT_SCALE_BPS {
            return Err(GenerationError::InvalidOddsTable(
                "tier weights must sum to 10000",
            ));
        }
        Ok(())
    }

    fn draw(&self, rng: &mut impl Rng) -> (usize, u32) {
        let roll = rng.gen_range(0..WEIGHT_SCALE_BPS);
        let mut acc = 0;
        for (index, tier) in self.tiers.iter().enumerate() {
            acc += tier.weight_bps;
            if roll < acc {
                let multiplier = rng.gen_range(tier.lo_tenths..=tier.hi_tenths);
                return (index, multiplier);
            }
        }
        // Weights sum to the scale, so the walk always lands in a tier.
        let last = self.tiers[LOW_TIER];
        (LOW_TIER, rng.gen_range(last.lo_tenths..=last.hi_tenths))
    }
}

/// Escalation policy for the practice jackpot tier.
///
/// After `dry_spell_threshold` practice rounds without a jackpot draw, the
/// jackpot weight grows each round (taken from the losing tier, keeping the
/// scale intact) up to `max_boost_bps`, and resets as soon as any jackpot
/// multiplier is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JackpotPolicy {
    pub dry_spell_threshold: u32,
    pub boost_bps_per_round: u32,
    pub max_boost_bps: u32,
}

impl Default for JackpotPolicy {
    fn default() -> Self {
        Self {
            dry_spell_threshold: 20,
            boost_bps_per_round: 50,
            max_boost_bps: 2_000,
        }
    }
}

/// Generator configuration: one odds table per mode plus the jackpot policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub practice: OddsTable,
    pub real: OddsTable,
    pub jackpot: JackpotPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            practice: OddsTable::practice_default(),
            real: OddsTable::real_default(),
            jackpot: JackpotPolicy::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), GenerationError> {
        self.practice.validate()?;
        self.real.validate()?;
        if self.jackpot.max_boost_bps >= self.practice.tiers[LOW_TIER].weight_bps {
            return Err(GenerationError::InvalidJackpotPolicy(
                "max boost must leave weight in the losing tier",
            ));
        }
        Ok(())
    }
}

/// Produces the zone sequence for new rounds and owns the practice
/// dry-spell counter (explicit state, injected rather than hidden in a
/// shared store).
#[derive(Clone, Debug)]
pub struct RoundGenerator {
    config: GeneratorConfig,
    dry_spell: u32,
}

impl RoundGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        config.validate()?;
        Ok(Self {
            config,
            dry_spell: 0,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Practice rounds since the last jackpot draw.
    pub fn dry_spell(&self) -> u32 {
        self.dry_spell
    }

    /// Practice table with the current dry-spell boost applied.
    fn effective_practice_table(&self) -> OddsTable {
        let policy = self.config.jackpot;
        let over = self.dry_spell.saturating_sub(policy.dry_spell_threshold);
        let boost = (over.saturating_mul(policy.boost_bps_per_round)).min(policy.max_boost_bps);
        if boost == 0 {
            return self.config.practice;
        }
        let mut table = self.config.practice;
        table.tiers[JACKPOT_TIER].weight_bps += boost;
        table.tiers[LOW_TIER].weight_bps -= boost;
        table
    }

    /// Generate the ordered zone sequence for one round.
    ///
    /// Positions are fixed and strictly increasing; only the multipliers are
    /// random. Multipliers are one-decimal values by construction (drawn in
    /// tenths).
    pub fn generate(
        &mut self,
        mode: Mode,
        rng: &mut impl Rng,
    ) -> Result<Vec<Zone>, GenerationError> {
        let table = match mode {
            Mode::Practice => self.effective_practice_table(),
            Mode::Real => self.config.real,
        };
        table.validate()?;

        let mut zones = Vec::with_capacity(ZONES_PER_ROUND);
        let mut drew_jackpot = false;
        for index in 0..ZONES_PER_ROUND {
            let (tier, multiplier_tenths) = table.draw(rng);
            drew_jackpot |= tier == JACKPOT_TIER;
            zones.push(Zone::new(zone_position_tenths(index), multiplier_tenths));
        }

        if mode == Mode::Practice {
            if drew_jackpot {
                self.dry_spell = 0;
            } else {
                self.dry_spell = self.dry_spell.saturating_add(1);
            }
        }

        Ok(zones)
    }
}
