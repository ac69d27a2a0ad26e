pub mod verdict;

pub use verdict::{MarkerVocabulary, Verdict};
