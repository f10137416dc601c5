pub mod confidence;
pub mod scores;
