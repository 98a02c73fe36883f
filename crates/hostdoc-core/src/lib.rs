//! hostdoc-core: measurement and analysis engine for a single-host
//! Linux diagnostics agent.
//!
//! The pipeline: collectors read kernel pseudo-filesystems into a
//! typed [`model::Snapshot`]; the [`engine::Engine`] keeps a bounded
//! history, differences consecutive snapshots into [`rates::Rates`],
//! and runs the four-domain root-cause [`analysis`] that produces a
//! ranked, trust-gated [`analysis::AnalysisResult`].
//!
//! Consumers (terminal UI, JSON/Markdown renderers, alert dispatch)
//! live outside this crate and read the published result; nothing
//! they do influences scoring.

pub mod analysis;
pub mod collector;
pub mod engine;
pub mod history;
pub mod model;
pub mod rates;
pub mod util;
