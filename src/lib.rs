//! MIFE ― multi-input functional encryption over graded encodings  (research prototype)

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, missing_docs)]

pub mod backend;
pub mod circuit;
pub mod decrypt;
pub mod dummy;
pub mod encrypt;
pub mod error;
pub mod index_set;
pub mod ladder;
pub mod mife;
pub mod params;
pub mod serialize;
pub mod work_queue;

pub use backend::{GradedBackend, KeygenParams};
pub use circuit::Circuit;
pub use dummy::DummyBackend;
pub use encrypt::Ciphertext;
pub use error::MifeError;
pub use index_set::IndexSet;
pub use mife::{smart_kappa, EvalKey, MifeInstance, SecretKey};
pub use params::{CircuitParams, PublicParams, SecretParams};
pub use work_queue::WorkQueue;
