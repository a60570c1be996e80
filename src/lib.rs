//! Differential [perft] harness: drives a candidate chess engine and a trusted
//! reference engine through the same matrix of positions and depths over a
//! minimal UCI subset, compares the reported node counts and accumulates
//! timing statistics for both.
//!
//! The pieces, leaves first:
//!
//! - [`process`] owns one engine subprocess and writes commands to it.
//! - [`drain`] consumes the engine output concurrently so that the engine never
//!   blocks on a full pipe.
//! - [`driver`] sequences one `position` / `go perft` / `quit` exchange and
//!   measures it.
//! - [`extract`] recovers the node count from free-form engine output.
//! - [`runner`] walks the test matrix and compares both engines.
//!
//! [perft]: https://www.chessprogramming.org/Perft

#![warn(missing_docs, variant_size_differences)]
// Rustc lints.
#![warn(
    absolute_paths_not_starting_with_crate,
    keyword_idents,
    macro_use_extern_crate,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]
// Rustdoc lints.
#![warn(
    rustdoc::private_doc_tests,
    rustdoc::missing_crate_level_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::invalid_codeblock_attributes,
    rustdoc::invalid_html_tags,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::bare_urls
)]
// Clippy lints.
#![warn(
    clippy::correctness,
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]

pub mod config;
pub mod drain;
pub mod driver;
pub mod error;
pub mod extract;
pub mod oracle;
pub mod position;
pub mod process;
pub mod runner;

pub use error::HarnessError;

use shadow_rs::shadow;

shadow!(build);

/// Cargo profile the harness was built with. Produced by `build.rs`.
const PROFILE: &str = include_str!(concat!(env!("OUT_DIR"), "/profile"));

/// Returns the full harness version that can be used to identify how it was
/// built in the first place.
#[must_use]
pub fn harness_version() -> String {
    format!(
        "{} (commit {}, branch {}, {PROFILE} profile)",
        build::PKG_VERSION,
        build::SHORT_COMMIT,
        build::BRANCH
    )
}
