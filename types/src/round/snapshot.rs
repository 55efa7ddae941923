use serde::Serialize;

use super::{Round, RoundStatus, ONE_X_BPS};

/// Client-facing view of one zone. A zone's multiplier stays hidden until
/// the flight has passed through it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    pub position: f64,
    pub revealed: bool,
    pub hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

/// Read-only projection of round state, pushed to the presentation layer on
/// every tick. Consumers issue exactly two intents back: start and cash out.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub status: RoundStatus,
    pub mode: &'static str,
    pub flight_position: f64,
    pub cumulative_multiplier: f64,
    pub stake_cents: u64,
    pub live_value_cents: u64,
    pub zones: Vec<ZoneView>,
}

impl RoundSnapshot {
    pub fn of(round: &Round) -> Self {
        let zones = round
            .zones
            .iter()
            .map(|zone| ZoneView {
                position: zone.position_tenths as f64 / 10.0,
                revealed: zone.hit,
                hit: zone.hit,
                multiplier: zone.hit.then(|| zone.multiplier_tenths as f64 / 10.0),
            })
            .collect();

        Self {
            round_id: round.round_id,
            status: round.status,
            mode: round.mode.as_str(),
            flight_position: round.position_tenths as f64 / 10.0,
            cumulative_multiplier: round.cumulative_bps as f64 / ONE_X_BPS as f64,
            stake_cents: round.stake_cents,
            live_value_cents: round.live_value_cents(),
            zones,
        }
    }
}
