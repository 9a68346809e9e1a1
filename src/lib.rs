#![doc = include_str!("../README.md")]

//! # Pulldown Library
//!
//! Building blocks of an AlphaFold 3 pulldown screen: one bait protein is
//! predicted together with many prey proteins, every predicted model is
//! scored, and the preys that bind the bait confidently are shortlisted
//! together with the bait domains they touch.
//!
//! Stages read and write Polars DataFrames saved as CSV, so each stage can be
//! rerun on its own. Structural measurements are delegated to ChimeraX
//! through the [`chimerax::StructureTool`] trait.

pub mod binding;
pub mod chains;
pub mod chimerax;
pub mod clashes;
pub mod combinations;
pub mod config;
pub mod discovery;
pub mod error;
pub mod launch;
pub mod merge;
pub mod metrics;
pub mod overlap;
pub mod report;
pub mod sequences;
pub mod structure;
pub mod uniprot;
pub mod utils;

// Re-export key public types
pub use config::{Domain, PipelineConfig, PulldownConfig};
pub use error::{RecordFailure, RecordOutcome, Result, ScreenError};
pub use utils::{load_model, write_df_to_file, DataFrameFileType};
