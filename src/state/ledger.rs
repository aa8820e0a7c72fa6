//! Append-only record of the arguments submitted in a room.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::room::{Argument, Evaluation};

/// Ordered list of submissions; entries are never removed or reordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentLedger {
    entries: Vec<Argument>,
}

impl ArgumentLedger {
    /// Rebuild a ledger from persisted entries, keeping their order.
    pub fn from_entries(entries: Vec<Argument>) -> Self {
        Self { entries }
    }

    /// Append a new argument and return its index.
    pub fn append(&mut self, argument: Argument) -> usize {
        self.entries.push(argument);
        self.entries.len() - 1
    }

    /// All arguments in submission order.
    pub fn entries(&self) -> &[Argument] {
        &self.entries
    }

    /// Whether `player` already submitted for `round`.
    pub fn has_submitted(&self, player: &str, round: u8) -> bool {
        self.entries
            .iter()
            .any(|argument| argument.round == round && argument.player == player)
    }

    /// Number of arguments submitted for `round`.
    pub fn submissions_in_round(&self, round: u8) -> usize {
        self.entries
            .iter()
            .filter(|argument| argument.round == round)
            .count()
    }

    /// Ledger indices of the arguments still awaiting the evaluator.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, argument)| argument.is_pending())
            .map(|(index, _)| index)
            .collect()
    }

    /// Number of arguments still awaiting the evaluator.
    pub fn pending_evaluations(&self) -> usize {
        self.entries.iter().filter(|a| a.is_pending()).count()
    }

    /// Sum of the recorded scores for `player`; unscored arguments count for zero.
    pub fn score_of(&self, player: &str) -> f64 {
        self.entries
            .iter()
            .filter(|argument| argument.player == player)
            .filter_map(|argument| argument.score)
            .sum()
    }

    /// Record the evaluator result for the argument at `index`.
    pub fn record_score(&mut self, index: usize, score: f64) -> Result<(), LedgerError> {
        let argument = self.pending_mut(index)?;
        argument.score = Some(score);
        argument.evaluation = Evaluation::Scored;
        Ok(())
    }

    /// Mark the argument at `index` as permanently unscored.
    pub fn record_failure(&mut self, index: usize) -> Result<(), LedgerError> {
        let argument = self.pending_mut(index)?;
        argument.evaluation = Evaluation::Failed;
        Ok(())
    }

    /// Arguments grouped by round, rounds in first-seen order.
    ///
    /// The grouping is recomputed on every call and never stored.
    pub fn by_round(&self) -> IndexMap<u8, Vec<&Argument>> {
        let mut rounds: IndexMap<u8, Vec<&Argument>> = IndexMap::new();
        for argument in &self.entries {
            rounds.entry(argument.round).or_default().push(argument);
        }
        rounds
    }

    fn pending_mut(&mut self, index: usize) -> Result<&mut Argument, LedgerError> {
        let argument = self
            .entries
            .get_mut(index)
            .ok_or(LedgerError::UnknownArgument(index))?;
        if !argument.is_pending() {
            return Err(LedgerError::AlreadyEvaluated(index));
        }
        Ok(argument)
    }
}

/// Failures raised when resolving an argument evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No argument exists at this index.
    #[error("no argument at index {0}")]
    UnknownArgument(usize),
    /// The argument was already scored or marked as failed.
    #[error("argument {0} has already been evaluated")]
    AlreadyEvaluated(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(entries: &[(&str, u8)]) -> ArgumentLedger {
        let mut ledger = ArgumentLedger::default();
        for (player, round) in entries {
            ledger.append(Argument::submitted(
                (*player).into(),
                *round,
                format!("{player} speaks in round {round}"),
            ));
        }
        ledger
    }

    #[test]
    fn tracks_submissions_per_round() {
        let ledger = ledger_with(&[("alice", 1), ("bob", 1), ("alice", 2)]);

        assert!(ledger.has_submitted("alice", 1));
        assert!(ledger.has_submitted("bob", 1));
        assert!(!ledger.has_submitted("bob", 2));
        assert_eq!(ledger.submissions_in_round(1), 2);
        assert_eq!(ledger.submissions_in_round(2), 1);
    }

    #[test]
    fn scores_sum_only_recorded_values() {
        let mut ledger = ledger_with(&[("alice", 1), ("bob", 1), ("alice", 2)]);
        ledger.record_score(0, 7.5).unwrap();
        ledger.record_score(2, 4.0).unwrap();

        assert_eq!(ledger.score_of("alice"), 11.5);
        assert_eq!(ledger.score_of("bob"), 0.0);
        assert_eq!(ledger.pending_evaluations(), 1);
        assert_eq!(ledger.pending_indices(), vec![1]);
    }

    #[test]
    fn evaluation_resolves_once() {
        let mut ledger = ledger_with(&[("alice", 1)]);
        ledger.record_failure(0).unwrap();

        assert_eq!(
            ledger.record_score(0, 3.0),
            Err(LedgerError::AlreadyEvaluated(0))
        );
        assert_eq!(
            ledger.record_score(4, 3.0),
            Err(LedgerError::UnknownArgument(4))
        );
        assert_eq!(ledger.entries()[0].evaluation, Evaluation::Failed);
    }

    #[test]
    fn round_projection_keeps_ledger_order() {
        let ledger = ledger_with(&[("alice", 1), ("bob", 1), ("alice", 2)]);
        let rounds = ledger.by_round();

        let keys: Vec<u8> = rounds.keys().copied().collect();
        assert_eq!(keys, vec![1, 2]);
        let first: Vec<&str> = rounds[&1].iter().map(|a| a.player.as_str()).collect();
        assert_eq!(first, vec!["alice", "bob"]);
    }
}
