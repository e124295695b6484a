//! # Config-driven package manager backends
//!
//! Every supported package manager is a `BackendConfig`: command templates
//! plus a description of how to parse their output. `GenericManager` turns a
//! config into a `PackageManager`.
//!
//! - [`config`]: the `BackendConfig` schema
//! - [`generic`]: `GenericManager` and subprocess execution
//! - [`parsers`]: whitespace, TSV, JSON and regex output parsers
//! - [`registry`]: built-in configs (apt, yum, brew, pip, flatpak, npm, pacman)
//! - [`user_parser`]: `backend "name" { ... }` blocks from the settings file
//!
//! User backends override built-ins with the same name:
//!
//! ```kdl
//! backend "zypper" {
//!     binary "zypper"
//!     list "rpm -qa --qf '%{NAME}\t%{VERSION}\n'" {
//!         format "tsv"
//!     }
//!     install "{binary} install -y {package}"
//!     install_version "{binary} install -y {package}={version}"
//!     remove "{binary} remove -y {package}"
//!     sudo #true
//! }
//! ```

pub mod config;
pub mod generic;
pub mod parsers;
pub mod registry;
pub mod user_parser;

pub use config::{BackendConfig, BinarySpecifier, OutputFormat};
pub use generic::GenericManager;
pub use registry::{builtin_backends, load_all_backends};
