//! Append-only debate history.

use crate::core::Report;
use crate::error::{Error, Result};
use crate::workflow::DebateRole;
use serde::{Deserialize, Serialize};

/// One argument in the debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateEntry {
    pub round: u32,
    pub role: DebateRole,
    pub report: Report,
}

/// Ordered arguments, at most two per configured round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateRecord {
    max_rounds: u32,
    entries: Vec<DebateEntry>,
}

impl DebateRecord {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            entries: Vec::new(),
        }
    }

    /// Append an argument. Rounds must not go backwards or past the maximum,
    /// and each role speaks once per round.
    pub fn append(&mut self, round: u32, role: DebateRole, report: Report) -> Result<()> {
        if round == 0 || round > self.max_rounds {
            return Err(Error::Validation(format!(
                "debate round {} outside 1..={}",
                round, self.max_rounds
            )));
        }
        if let Some(last) = self.entries.last() {
            if round < last.round {
                return Err(Error::Validation(format!(
                    "debate round {} appended after round {}",
                    round, last.round
                )));
            }
        }
        if self
            .entries
            .iter()
            .any(|e| e.round == round && e.role == role)
        {
            return Err(Error::Validation(format!(
                "{} already argued in round {}",
                role, round
            )));
        }

        self.entries.push(DebateEntry {
            round,
            role,
            report,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[DebateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent argument from `role`.
    pub fn latest(&self, role: DebateRole) -> Option<&DebateEntry> {
        self.entries.iter().rev().find(|e| e.role == role)
    }

    /// One line per argument, oldest first.
    pub fn transcript(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[round {} {}] {}", e.round, e.role, e.report.narrative))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argument(text: &str) -> Report {
        Report::new("debater", text, 0.6, 0.1)
    }

    #[test]
    fn test_append_and_transcript() {
        let mut record = DebateRecord::new(2);
        record.append(1, DebateRole::Proponent, argument("growth")).unwrap();
        record.append(1, DebateRole::Opponent, argument("valuation")).unwrap();
        record.append(2, DebateRole::Proponent, argument("margins")).unwrap();

        assert_eq!(record.len(), 3);
        assert_eq!(
            record.transcript(),
            "[round 1 proponent] growth\n[round 1 opponent] valuation\n[round 2 proponent] margins"
        );
        assert_eq!(record.latest(DebateRole::Opponent).unwrap().round, 1);
        assert_eq!(record.latest(DebateRole::Proponent).unwrap().round, 2);
    }

    #[test]
    fn test_round_past_maximum_rejected() {
        let mut record = DebateRecord::new(1);
        assert!(record.append(2, DebateRole::Proponent, argument("x")).is_err());
        assert!(record.append(0, DebateRole::Proponent, argument("x")).is_err());
        assert!(record.is_empty());
    }

    #[test]
    fn test_record_is_append_only() {
        let mut record = DebateRecord::new(3);
        record.append(2, DebateRole::Proponent, argument("a")).unwrap();
        assert!(record.append(1, DebateRole::Opponent, argument("b")).is_err());
        assert!(record.append(2, DebateRole::Proponent, argument("c")).is_err());
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(DebateRecord::new(1).transcript(), "");
    }
}
