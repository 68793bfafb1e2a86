/*!
 * Translation statistics.
 *
 * Plural forms count as a single string. Fuzzy strings are never counted
 * as translated, and the untranslated count is always derived.
 */

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use super::unit::TranslationUnit;

/// Aggregable `(total, translated, fuzzy)` counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of units
    pub total: usize,
    /// Units whose every plural slot has a non-empty target
    pub translated: usize,
    /// Units carrying the fuzzy flag
    pub fuzzy: usize,
}

impl Statistics {
    /// Create statistics from raw counts
    pub fn new(total: usize, translated: usize, fuzzy: usize) -> Self {
        Self {
            total,
            translated,
            fuzzy,
        }
    }

    /// Units that are neither translated nor fuzzy
    pub fn untranslated(&self) -> usize {
        self.total.saturating_sub(self.translated + self.fuzzy)
    }

    /// Add up statistics from another object
    pub fn accum(&mut self, other: &Statistics) {
        self.total += other.total;
        self.translated += other.translated;
        self.fuzzy += other.fuzzy;
    }

    /// Classify a single unit
    pub fn of_unit(unit: &TranslationUnit) -> Self {
        let mut stats = Self::new(1, 0, 0);
        if unit.is_fuzzy() {
            stats.fuzzy = 1;
        } else if unit.is_translated() {
            stats.translated = 1;
        }
        stats
    }

    /// One linear scan over a unit sequence
    pub fn of_units<'a, I>(units: I) -> Self
    where
        I: IntoIterator<Item = &'a TranslationUnit>,
    {
        units.into_iter().map(Self::of_unit).sum()
    }

    /// Share of translated units, 0.0 for an empty set
    pub fn translated_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.translated as f64 * 100.0 / self.total as f64
        }
    }
}

impl Add for Statistics {
    type Output = Statistics;

    fn add(mut self, rhs: Statistics) -> Statistics {
        self.accum(&rhs);
        self
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, rhs: Statistics) {
        self.accum(&rhs);
    }
}

impl Sum for Statistics {
    fn sum<I: Iterator<Item = Statistics>>(iter: I) -> Statistics {
        iter.fold(Statistics::default(), Add::add)
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} total, {} translated, {} fuzzy, {} untranslated",
            self.total,
            self.translated,
            self.fuzzy,
            self.untranslated()
        )
    }
}
