pub mod medication_history;

pub use medication_history::*;
