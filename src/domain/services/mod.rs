pub mod change;
pub mod draft_builder;
pub mod fees;
pub mod outputs;
pub mod recorder;
