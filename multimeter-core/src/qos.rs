use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delivery guarantee of a message or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid QoS level {0}, expected 0, 1 or 2")]
pub struct QosError(pub u8);

impl TryFrom<u8> for QoS {
    type Error = QosError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(QosError(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> u8 {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS {}", u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_convert_both_ways() {
        for level in 0..=2u8 {
            let qos = QoS::try_from(level).unwrap();
            assert_eq!(u8::from(qos), level);
        }
    }

    #[test]
    fn level_three_is_rejected() {
        assert_eq!(QoS::try_from(3), Err(QosError(3)));
    }

    #[test]
    fn display_names_the_level() {
        assert_eq!(QoS::ExactlyOnce.to_string(), "QoS 2");
    }
}
