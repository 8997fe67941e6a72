pub mod client;
pub mod models;
pub mod reconcile;

pub use client::{AnswerKeyClient, ExamLocator, locate_exam};
pub use models::{AnswerKey, ApiQuestion};
pub use reconcile::{AlignStrategy, ReconcileOptions, Reconciled, reconcile};
