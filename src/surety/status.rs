use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SuretyError;

/// Outcome of a flight status query.
///
/// The numeric codes are part of the oracle wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FlightStatus {
    Unknown,
    OnTime,
    /// Delay caused by the airline; the only status that pays out
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    pub const ALL: [FlightStatus; 6] = [
        FlightStatus::Unknown,
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
    ];

    pub fn code(self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn triggers_payout(self) -> bool {
        self == FlightStatus::LateAirline
    }
}

impl Default for FlightStatus {
    fn default() -> Self {
        FlightStatus::Unknown
    }
}

impl From<FlightStatus> for u8 {
    fn from(status: FlightStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for FlightStatus {
    type Error = SuretyError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        FlightStatus::ALL
            .iter()
            .copied()
            .find(|status| status.code() == code)
            .ok_or(SuretyError::InvalidStatusCode(code))
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightStatus::Unknown => "unknown",
            FlightStatus::OnTime => "on time",
            FlightStatus::LateAirline => "late (airline)",
            FlightStatus::LateWeather => "late (weather)",
            FlightStatus::LateTechnical => "late (technical)",
            FlightStatus::LateOther => "late (other)",
        };
        write!(f, "{} ({})", self.code(), name)
    }
}
