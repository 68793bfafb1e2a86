/*!
 * Translation merge: rebuild a translation store against a new template.
 */

use log::debug;

use crate::capability::TranslationStore;
use crate::errors::Result;
use crate::model::TranslationUnit;

/// Carries translations over to a new template by source text lookup
///
/// The template decides unit order, source strings and comments. For every
/// plural slot the translation store is asked for a target with the same
/// source; a non-empty answer replaces the template's target. A missing
/// translation is not an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleMerger;

impl SimpleMerger {
    pub fn new() -> Self {
        Self
    }

    /// Compute the merged unit sequence without touching either store
    pub fn merged_units<T, S>(&self, translation: &T, template: &S) -> Result<Vec<TranslationUnit>>
    where
        T: TranslationStore + ?Sized,
        S: TranslationStore + ?Sized,
    {
        let mut adopted = 0usize;
        let mut units = template.units()?;
        for unit in units.iter_mut() {
            for (plural, (source, target)) in unit.trans.iter_mut().enumerate() {
                if let Some(found) = translation.translate(source, plural)? {
                    if !found.is_empty() {
                        *target = found;
                        adopted += 1;
                    }
                }
            }
        }
        debug!(
            "Merged {} units against template, adopted {} translated slots",
            units.len(),
            adopted
        );
        Ok(units)
    }

    /// Replace the translation store's units with the merged sequence
    pub fn merge<T, S>(&self, translation: &T, template: &S) -> Result<()>
    where
        T: TranslationStore + ?Sized,
        S: TranslationStore + ?Sized,
    {
        let units = self.merged_units(translation, template)?;
        translation.fill(units)
    }
}
