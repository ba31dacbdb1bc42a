pub mod locate;
pub mod parse;

pub use locate::ReportLocator;
pub use parse::parse_document;
