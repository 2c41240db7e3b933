pub mod classifier;
pub mod csv_parser;
pub mod error;
pub mod fields;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod schema;
pub mod validation;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;
