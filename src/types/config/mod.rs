pub mod ingester;
pub mod instructions;
pub mod sink;
