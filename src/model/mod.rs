/*!
 * Entity model shared by every backend.
 *
 * These are plain records: a backend decides where they live, the model
 * only defines identity and mutation rules.
 */

pub mod header;
pub mod language;
pub mod statistics;
pub mod unit;

pub use header::Header;
pub use language::LanguageInfo;
pub use statistics::Statistics;
pub use unit::{CommentKind, Comments, Suggestion, TranslationUnit};
