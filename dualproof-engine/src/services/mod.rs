//! Engine components
//!
//! The scorer and policy evaluator are pure over their inputs, the
//! correlator is a read-only join, and the deriver owns the single
//! critical section (storage-enforced, per pair).

pub mod audio_decoder;
pub mod auditor;
pub mod correlator;
pub mod deriver;
pub mod embedder;
pub mod policy;
pub mod scorer;
pub mod similarity;

pub use audio_decoder::{decode_audio_bytes, decode_audio_file, DecodedAudio};
pub use auditor::{Auditor, SweepReport};
pub use correlator::{Correlation, CorrelationStatus, Correlator};
pub use deriver::{compute_splits, DeriveOutcome, Deriver, SplitLine};
pub use embedder::Embedder;
pub use policy::{AttributionPolicy, PolicyDecision};
pub use scorer::Scorer;
pub use similarity::{cosine_similarity, influence_shares, rank_matches, ScoredTrack};
