// src/formula/mod.rs

//! Formulas: declarative descriptions of third-party software
//!
//! A formula says where a piece of software comes from, what it needs,
//! how to build and install it, and how it should be run afterwards:
//! - Source archive and its checksum
//! - Prebuilt payloads ("bottles") keyed by platform tag
//! - Build-only and runtime dependencies
//! - Environment mutations for the build
//! - Configure, build and install steps
//! - An optional supervised service and post-install caveats
//!
//! # Example Formula
//!
//! ```toml
//! [formula]
//! name = "transmission"
//! description = "Lightweight BitTorrent client"
//! homepage = "https://www.transmissionbt.com/"
//!
//! [source]
//! url = "https://example.com/transmission-2.94.tar.xz"
//! checksum = "sha256:35442cc849f91f8df982c3d0d479d650c6ca19310a994eccdaa79a4af3916b7d"
//!
//! [[dependencies]]
//! name = "pkg-config"
//! scope = "build"
//!
//! [[install.configure]]
//! executable = "./configure"
//! args = ["--prefix=%(prefix)s"]
//!
//! [[install.install]]
//! executable = "make"
//! args = ["install"]
//! ```

pub mod artifact;
pub mod dependency;
mod format;
pub mod parser;
pub mod template;

pub use artifact::{host_platform_tag, ArtifactDescriptor, Payload, Prebuilt};
pub use dependency::{Dependency, DependencyResolver, DependencyScope, DependencySet, NoopResolver};
pub use format::{
    BottleSection, CaveatSection, Formula, FormulaSection, InstallSection, ServiceSection,
    SourceSection, StepTemplate,
};
pub use parser::{parse_formula, parse_formula_file, validate_formula};
