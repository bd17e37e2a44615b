//! Word analysis: per-facet provider calls and the concurrent aggregate.
//!
//! * [`WordAnalysisService`] — resolves providers through the registry,
//!   runs one facet or all configured facets, caches audio and routes
//!   multi-candidate results through a [`crate::select::CandidateSelector`].
//! * [`ProviderConfiguration`] — facet → provider name for one run.
//! * [`WordAnalysis`] — the assembled, serialisable record.
//! * [`AnalysisReport`] / [`FacetFailure`] — record plus fatal failures.

pub mod record;
pub mod service;

pub use record::{
    AnalysisError, AnalysisReport, FacetFailure, ProviderConfiguration, WordAnalysis,
};
pub use service::WordAnalysisService;

pub use crate::provider::Word;
