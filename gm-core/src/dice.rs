//! Dice notation parsing and evaluation.
//!
//! Supports compact dice notation: `d20`, `2d6+3`, `4d6kh3` (keep highest),
//! `2d20kl1` (keep lowest), and arbitrary die sizes like `d3`, `d7`, `d25`.
//! Advantage and disadvantage are evaluation-time modes, not notation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing and evaluation.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Missing 'd' separator in notation: {0}")]
    MissingSeparator(String),
    #[error("Invalid die count in notation: {0}")]
    InvalidCount(String),
    #[error("Die count must be at least 1 (in {0})")]
    ZeroCount(String),
    #[error("Invalid die size in notation: {0}")]
    InvalidSides(String),
    #[error("Die size must be at least 1 (in {0})")]
    ZeroSides(String),
    #[error("Invalid keep clause in notation: {0}")]
    InvalidKeep(String),
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
    #[error("Invalid modifier in notation: {0}")]
    InvalidModifier(String),
    #[error("Trailing characters in notation: {0}")]
    TrailingInput(String),
    #[error("Advantage/disadvantage cannot be combined with a keep clause (in {0})")]
    KeepWithAdvantage(String),
}

/// How a roll is evaluated.
///
/// Advantage and disadvantage draw the whole expression twice and keep
/// the better or worse total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl RollMode {
    /// Parse a mode name as it appears in tool arguments.
    pub fn from_name(name: &str) -> Option<RollMode> {
        match name.to_lowercase().as_str() {
            "normal" => Some(RollMode::Normal),
            "advantage" => Some(RollMode::Advantage),
            "disadvantage" => Some(RollMode::Disadvantage),
            _ => None,
        }
    }
}

impl fmt::Display for RollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollMode::Normal => write!(f, "normal"),
            RollMode::Advantage => write!(f, "advantage"),
            RollMode::Disadvantage => write!(f, "disadvantage"),
        }
    }
}

/// Which end of the rolls a keep clause selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepKind {
    Highest,
    Lowest,
}

/// A `khN`/`klN` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepClause {
    pub kind: KeepKind,
    pub n: u32,
}

/// A parsed dice expression (e.g. `4d6kh3+2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<KeepClause>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    ///
    /// Grammar: `[count] "d" sides [kh|kl n] [+|- modifier]`,
    /// case-insensitive. Parsing is total: the same input always yields
    /// the same expression or the same error.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let original = notation.trim().to_lowercase();
        let s = original.as_str();

        let d_pos = s
            .find('d')
            .ok_or_else(|| DiceError::MissingSeparator(original.clone()))?;

        let count_str = &s[..d_pos];
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            // Digits only: u32::from_str would accept a leading '+'
            if !count_str.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DiceError::InvalidCount(original.clone()));
            }
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidCount(original.clone()))?
        };
        if count == 0 {
            return Err(DiceError::ZeroCount(original.clone()));
        }

        let mut rest = &s[d_pos + 1..];

        let sides_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if sides_len == 0 {
            return Err(DiceError::InvalidSides(original.clone()));
        }
        let sides: u32 = rest[..sides_len]
            .parse()
            .map_err(|_| DiceError::InvalidSides(original.clone()))?;
        if sides == 0 {
            return Err(DiceError::ZeroSides(original.clone()));
        }
        rest = &rest[sides_len..];

        let keep = if let Some(kind) = match rest.get(..2) {
            Some("kh") => Some(KeepKind::Highest),
            Some("kl") => Some(KeepKind::Lowest),
            _ => None,
        } {
            rest = &rest[2..];
            let n_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
            if n_len == 0 {
                return Err(DiceError::InvalidKeep(original.clone()));
            }
            let n: u32 = rest[..n_len]
                .parse()
                .map_err(|_| DiceError::InvalidKeep(original.clone()))?;
            rest = &rest[n_len..];
            if n < 1 {
                return Err(DiceError::InvalidKeep(original.clone()));
            }
            if n > count {
                return Err(DiceError::InvalidKeepCount {
                    keep: n,
                    count,
                    notation: original.clone(),
                });
            }
            Some(KeepClause { kind, n })
        } else {
            None
        };

        let modifier = if let Some(sign) = rest.chars().next().filter(|c| *c == '+' || *c == '-') {
            rest = &rest[1..];
            let m_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
            if m_len == 0 {
                return Err(DiceError::InvalidModifier(original.clone()));
            }
            let magnitude: i32 = rest[..m_len]
                .parse()
                .map_err(|_| DiceError::InvalidModifier(original.clone()))?;
            rest = &rest[m_len..];
            if sign == '-' {
                -magnitude
            } else {
                magnitude
            }
        } else {
            0
        };

        if !rest.is_empty() {
            return Err(DiceError::TrailingInput(original.clone()));
        }

        Ok(DiceExpression {
            count,
            sides,
            keep,
            modifier,
            original,
        })
    }

    /// Evaluate the expression under the given roll mode.
    ///
    /// Advantage/disadvantage evaluate the whole expression twice and
    /// select the draw with the higher/lower total; both draws appear in
    /// `details` but only the selected draw populates the roll fields.
    /// Combining either mode with a keep clause is rejected before any
    /// dice are drawn.
    pub fn evaluate<R: Rng>(&self, mode: RollMode, rng: &mut R) -> Result<RollResult, DiceError> {
        match mode {
            RollMode::Normal => Ok(self.draw(rng)),
            RollMode::Advantage | RollMode::Disadvantage => {
                if self.keep.is_some() {
                    return Err(DiceError::KeepWithAdvantage(self.original.clone()));
                }

                let first = self.draw(rng);
                let second = self.draw(rng);

                // Ties resolve to the first draw
                let keep_first = match mode {
                    RollMode::Advantage => first.total >= second.total,
                    RollMode::Disadvantage => first.total <= second.total,
                    RollMode::Normal => unreachable!(),
                };
                let (mut chosen, other) = if keep_first {
                    (first, second)
                } else {
                    (second, first)
                };

                chosen.details = format!(
                    "{} ({}): [{}] vs [{}] kept [{}] {:+} = {}",
                    self.original,
                    mode,
                    join_rolls(&chosen.individual_rolls),
                    join_rolls(&other.individual_rolls),
                    join_rolls(&chosen.kept_rolls),
                    self.modifier,
                    chosen.total
                );
                Ok(chosen)
            }
        }
    }

    /// One full draw of the expression in normal mode.
    fn draw<R: Rng>(&self, rng: &mut R) -> RollResult {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();

        let kept_rolls = match self.keep {
            Some(KeepClause { kind, n }) => {
                // Select by index so ties break on original roll order
                let mut indices: Vec<usize> = (0..rolls.len()).collect();
                match kind {
                    KeepKind::Highest => {
                        indices.sort_by(|&a, &b| rolls[b].cmp(&rolls[a]).then(a.cmp(&b)))
                    }
                    KeepKind::Lowest => {
                        indices.sort_by(|&a, &b| rolls[a].cmp(&rolls[b]).then(a.cmp(&b)))
                    }
                }
                indices.truncate((n as usize).min(rolls.len()));
                indices.into_iter().map(|i| rolls[i]).collect()
            }
            None => rolls.clone(),
        };

        let total = kept_rolls.iter().map(|&r| i64::from(r)).sum::<i64>() + i64::from(self.modifier);

        let details = if self.keep.is_some() {
            format!(
                "{}: [{}] keep [{}] {:+} = {}",
                self.original,
                join_rolls(&rolls),
                join_rolls(&kept_rolls),
                self.modifier,
                total
            )
        } else {
            format!(
                "{}: [{}] {:+} = {}",
                self.original,
                join_rolls(&rolls),
                self.modifier,
                total
            )
        };

        RollResult {
            individual_rolls: rolls,
            kept_rolls,
            modifier: self.modifier,
            total,
            details,
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Complete result of evaluating a dice expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    /// Every die drawn for the selected draw, in roll order.
    pub individual_rolls: Vec<u32>,
    /// The rolls selected by the keep clause, or all rolls without one.
    pub kept_rolls: Vec<u32>,
    pub modifier: i32,
    /// Sum of kept rolls plus modifier.
    pub total: i64,
    /// Human-readable rendering, e.g. `4d6kh3: [5, 3, 6, 1] keep [6, 5, 3] +0 = 14`.
    pub details: String,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

fn join_rolls(rolls: &[u32]) -> String {
    rolls
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A reusable random source for dice evaluation.
///
/// Seed it for deterministic tests; evaluation never touches wall-clock
/// time or any state beyond this source.
#[derive(Debug)]
pub struct DiceRoller {
    rng: StdRng,
}

impl DiceRoller {
    /// Create a roller seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a deterministic roller from a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Parse and evaluate a notation string.
    pub fn roll(&mut self, notation: &str, mode: RollMode) -> Result<RollResult, DiceError> {
        DiceExpression::parse(notation)?.evaluate(mode, &mut self.rng)
    }
}

impl Default for DiceRoller {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to roll a notation string in normal mode.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    DiceExpression::parse(notation)?.evaluate(RollMode::Normal, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("2d6+3").unwrap();
        assert_eq!(expr.count, 2);
        assert_eq!(expr.sides, 6);
        assert_eq!(expr.modifier, 3);
        assert!(expr.keep.is_none());
    }

    #[test]
    fn test_parse_implicit_count() {
        let expr = DiceExpression::parse("d25").unwrap();
        assert_eq!(expr.count, 1);
        assert_eq!(expr.sides, 25);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_keep_highest() {
        let expr = DiceExpression::parse("4d6kh3").unwrap();
        assert_eq!(expr.count, 4);
        assert_eq!(expr.sides, 6);
        assert_eq!(
            expr.keep,
            Some(KeepClause {
                kind: KeepKind::Highest,
                n: 3
            })
        );
    }

    #[test]
    fn test_parse_keep_lowest_with_modifier() {
        let expr = DiceExpression::parse("2d20kl1-2").unwrap();
        assert_eq!(
            expr.keep,
            Some(KeepClause {
                kind: KeepKind::Lowest,
                n: 1
            })
        );
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let expr = DiceExpression::parse("4D6KH3+2").unwrap();
        assert_eq!(expr.sides, 6);
        assert_eq!(expr.keep.map(|k| k.n), Some(3));
        assert_eq!(expr.modifier, 2);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = DiceExpression::parse("3d8kh2+1").unwrap();
        let b = DiceExpression::parse("3d8kh2+1").unwrap();
        assert_eq!(a.count, b.count);
        assert_eq!(a.sides, b.sides);
        assert_eq!(a.keep, b.keep);
        assert_eq!(a.modifier, b.modifier);
    }

    #[test]
    fn test_parse_errors_are_distinct() {
        assert!(matches!(
            DiceExpression::parse("abc"),
            Err(DiceError::MissingSeparator(_))
        ));
        assert!(matches!(
            DiceExpression::parse("42"),
            Err(DiceError::MissingSeparator(_))
        ));
        assert!(matches!(
            DiceExpression::parse("0d6"),
            Err(DiceError::ZeroCount(_))
        ));
        assert!(matches!(
            DiceExpression::parse("d0"),
            Err(DiceError::ZeroSides(_))
        ));
        assert!(matches!(
            DiceExpression::parse("2d6kh5"),
            Err(DiceError::InvalidKeepCount {
                keep: 5,
                count: 2,
                ..
            })
        ));
        assert!(matches!(
            DiceExpression::parse("2d6x"),
            Err(DiceError::TrailingInput(_))
        ));
        assert!(matches!(
            DiceExpression::parse("d6+"),
            Err(DiceError::InvalidModifier(_))
        ));
        assert!(matches!(
            DiceExpression::parse("4d6kh"),
            Err(DiceError::InvalidKeep(_))
        ));
    }

    #[test]
    fn test_signed_count_rejected() {
        assert!(matches!(
            DiceExpression::parse("+2d6"),
            Err(DiceError::InvalidCount(_))
        ));
        assert!(matches!(
            DiceExpression::parse("-2d6"),
            Err(DiceError::InvalidCount(_))
        ));
    }

    #[test]
    fn test_keep_equal_to_count_is_ok() {
        assert!(DiceExpression::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_roll_range() {
        let mut roller = DiceRoller::with_seed(7);
        for _ in 0..200 {
            let result = roller.roll("d20", RollMode::Normal).unwrap();
            assert!(result.total >= 1 && result.total <= 20);
            for &r in &result.individual_rolls {
                assert!((1..=20).contains(&r));
            }
        }
    }

    #[test]
    fn test_arbitrary_die_size() {
        let mut roller = DiceRoller::with_seed(11);
        for _ in 0..100 {
            let result = roller.roll("3d7", RollMode::Normal).unwrap();
            assert!(result.individual_rolls.iter().all(|&r| (1..=7).contains(&r)));
        }
    }

    #[test]
    fn test_keep_highest_selection() {
        let mut roller = DiceRoller::with_seed(3);
        for _ in 0..100 {
            let result = roller.roll("4d6kh3", RollMode::Normal).unwrap();
            assert_eq!(result.individual_rolls.len(), 4);
            assert_eq!(result.kept_rolls.len(), 3);

            // Kept must be the three largest values
            let mut sorted = result.individual_rolls.clone();
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            let mut kept = result.kept_rolls.clone();
            kept.sort_unstable_by(|a, b| b.cmp(a));
            assert_eq!(kept, sorted[..3].to_vec());
        }
    }

    #[test]
    fn test_total_is_sum_of_kept_plus_modifier() {
        let mut roller = DiceRoller::with_seed(5);
        for notation in ["2d6+3", "4d6kh3", "2d20kl1-4", "d100"] {
            for _ in 0..50 {
                let result = roller.roll(notation, RollMode::Normal).unwrap();
                let sum: i64 = result.kept_rolls.iter().map(|&r| i64::from(r)).sum();
                assert_eq!(result.total, sum + i64::from(result.modifier));
            }
        }
    }

    #[test]
    fn test_no_keep_keeps_everything() {
        let mut roller = DiceRoller::with_seed(9);
        let result = roller.roll("5d8", RollMode::Normal).unwrap();
        assert_eq!(result.kept_rolls, result.individual_rolls);
    }

    #[test]
    fn test_seeded_roller_is_deterministic() {
        let mut a = DiceRoller::with_seed(42);
        let mut b = DiceRoller::with_seed(42);
        for _ in 0..20 {
            let ra = a.roll("4d6kh3+2", RollMode::Normal).unwrap();
            let rb = b.roll("4d6kh3+2", RollMode::Normal).unwrap();
            assert_eq!(ra.individual_rolls, rb.individual_rolls);
            assert_eq!(ra.total, rb.total);
        }
    }

    #[test]
    fn test_advantage_selects_higher_total() {
        let expr = DiceExpression::parse("d20").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            // Reproduce the two draws the evaluator makes
            let mut probe = rng.clone();
            let first: u32 = probe.gen_range(1..=20);
            let second: u32 = probe.gen_range(1..=20);

            let result = expr.evaluate(RollMode::Advantage, &mut rng).unwrap();
            assert_eq!(result.total, i64::from(first.max(second)));
            assert_eq!(result.individual_rolls.len(), 1);
        }
    }

    #[test]
    fn test_disadvantage_selects_lower_total() {
        let expr = DiceExpression::parse("2d6+1").unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let mut probe = rng.clone();
            let first: i64 = (0..2).map(|_| i64::from(probe.gen_range(1..=6u32))).sum::<i64>() + 1;
            let second: i64 = (0..2).map(|_| i64::from(probe.gen_range(1..=6u32))).sum::<i64>() + 1;

            let result = expr.evaluate(RollMode::Disadvantage, &mut rng).unwrap();
            assert_eq!(result.total, first.min(second));
        }
    }

    #[test]
    fn test_advantage_details_show_both_draws() {
        let expr = DiceExpression::parse("d20").unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let result = expr.evaluate(RollMode::Advantage, &mut rng).unwrap();
        assert!(result.details.contains("advantage"));
        assert!(result.details.contains("vs"));
    }

    #[test]
    fn test_advantage_with_keep_rejected() {
        let expr = DiceExpression::parse("4d6kh3").unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let before = rng.clone().gen_range(1..=6u32);

        let result = expr.evaluate(RollMode::Advantage, &mut rng);
        assert!(matches!(result, Err(DiceError::KeepWithAdvantage(_))));

        // No dice were drawn: the rng state is untouched
        assert_eq!(rng.gen_range(1..=6u32), before);
    }

    #[test]
    fn test_details_rendering() {
        let mut roller = DiceRoller::with_seed(8);
        let result = roller.roll("4d6kh3", RollMode::Normal).unwrap();
        assert!(result.details.starts_with("4d6kh3: ["));
        assert!(result.details.contains("keep ["));
        assert!(result.details.contains("+0 = "));
        assert!(result.details.ends_with(&result.total.to_string()));
    }
}
