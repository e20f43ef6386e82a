//! Packet size validation per application

use std::collections::BTreeSet;

use crate::config::LengthRuleConfig;
use crate::types::{Packet, PacketLength};
use crate::{Result, TelemetryError};

/// Accepted total packet sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthRule {
    Range { min: usize, max: usize },
    Allowed(BTreeSet<usize>),
}

impl LengthRule {
    pub fn from_config(config: &LengthRuleConfig) -> std::result::Result<Self, String> {
        let in_bounds = |len: usize| (PacketLength::MIN_TOTAL..=PacketLength::MAX_TOTAL).contains(&len);
        match config {
            LengthRuleConfig::Range { min, max } => {
                if min > max {
                    return Err(format!("length range {}..={} is inverted", min, max));
                }
                if !in_bounds(*min) || !in_bounds(*max) {
                    return Err(format!("length range {}..={} outside packet limits", min, max));
                }
                Ok(LengthRule::Range { min: *min, max: *max })
            }
            LengthRuleConfig::Allowed(lengths) => {
                if lengths.is_empty() {
                    return Err("allowed length list is empty".to_string());
                }
                if let Some(bad) = lengths.iter().find(|len| !in_bounds(**len)) {
                    return Err(format!("allowed length {} outside packet limits", bad));
                }
                Ok(LengthRule::Allowed(lengths.iter().copied().collect()))
            }
        }
    }

    pub fn accepts(&self, length: usize) -> bool {
        match self {
            LengthRule::Range { min, max } => (*min..=*max).contains(&length),
            LengthRule::Allowed(lengths) => lengths.contains(&length),
        }
    }
}

/// Sequence counts of packets whose size broke the rule.
#[derive(Debug, Clone)]
pub struct WrongLengthList {
    rule: LengthRule,
    sequences: Vec<u16>,
}

impl WrongLengthList {
    pub fn new(config: &LengthRuleConfig) -> Result<Self> {
        let rule = LengthRule::from_config(config).map_err(|reason| TelemetryError::config_error("lengths", reason))?;
        Ok(Self::with_rule(rule))
    }

    pub fn with_rule(rule: LengthRule) -> Self {
        Self { rule, sequences: Vec::new() }
    }

    /// Returns false and records the packet when its size is wrong.
    pub fn check(&mut self, packet: &Packet) -> bool {
        if self.rule.accepts(packet.len()) {
            return true;
        }
        self.sequences.push(packet.sequence_count());
        false
    }

    pub fn rule(&self) -> &LengthRule {
        &self.rule
    }

    pub fn sequences(&self) -> &[u16] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn clear(&mut self) {
        self.sequences.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::packet_bytes;

    fn packet(sequence: u16, length: usize) -> Packet {
        Packet::from_bytes(&packet_bytes(3, sequence, length)).unwrap()
    }

    #[test]
    fn range_rule() {
        let mut list = WrongLengthList::new(&LengthRuleConfig::Range { min: 20, max: 30 }).unwrap();
        assert!(list.check(&packet(0, 20)));
        assert!(list.check(&packet(1, 30)));
        assert!(!list.check(&packet(2, 31)));
        assert!(!list.check(&packet(3, 19)));
        assert_eq!(list.sequences(), &[2, 3]);
    }

    #[test]
    fn allow_set_rule() {
        let mut list = WrongLengthList::new(&LengthRuleConfig::Allowed(vec![16, 64])).unwrap();
        assert!(list.check(&packet(0, 64)));
        assert!(!list.check(&packet(1, 32)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(WrongLengthList::new(&LengthRuleConfig::Range { min: 30, max: 20 }).is_err());
        assert!(WrongLengthList::new(&LengthRuleConfig::Range { min: 3, max: 20 }).is_err());
        assert!(WrongLengthList::new(&LengthRuleConfig::Allowed(vec![])).is_err());
    }
}
