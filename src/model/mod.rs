//! Statement and pattern model.

pub mod pattern;
pub mod statement;
pub mod term;

pub use pattern::StatementPattern;
pub use statement::Statement;
pub use term::Term;
