//! Reporting: confusion-matrix accumulation and CSV output.

pub mod confusion;

pub use confusion::ConfusionMatrix;
