//! CLI subcommand implementations.

pub mod flush;
pub mod queue;
pub mod status;
pub mod track;
