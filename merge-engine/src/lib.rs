//! # buildsync-merge
//!
//! Keeps generator-owned Bazel rules in a BUILD file in sync with a freshly
//! generated rule set, without destroying anything a person wrote by hand.
//!
//! ## Approach
//!
//! 1. **Load**: the existing BUILD file is parsed into a tree whose nodes own
//!    their comments. A missing or empty file is an empty tree.
//! 2. **Reconcile the load statement**: the `load` of the managed rules module
//!    is recomputed from scratch and placed right after `package()`.
//! 3. **Reconcile rules**: managed rules are matched to generated rules by
//!    name. Matched rules get the generated kind and managed attributes
//!    (`srcs`, `deps`, `library`); every other attribute, comment and
//!    statement is left alone. Stale managed rules are pruned and new ones
//!    appended.
//! 4. **Print**: the caller formats the merged tree and writes it out.
//!
//! ## Example
//!
//! ```rust
//! use buildsync_merge::{parse, format, Reconciler};
//!
//! let mut existing = parse(
//!     "BUILD",
//!     "go_library(\n    name = \"foo\",\n    srcs = [\"old.go\"],\n    visibility = [\"//visibility:public\"],\n)\n",
//! )
//! .unwrap();
//! let generated = parse("BUILD", "go_library(name = \"foo\", srcs = [\"foo.go\"])\n").unwrap();
//!
//! Reconciler::default().reconcile_file(&mut existing, &generated);
//!
//! let merged = format(&existing);
//! assert!(merged.starts_with("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")"));
//! assert!(merged.contains("srcs = [\"foo.go\"]"));
//! assert!(merged.contains("visibility = [\"//visibility:public\"]"));
//! ```

pub mod diff;
pub mod error;
pub mod loader;
pub mod managed;
pub mod parser;
pub mod printer;
pub mod reconcile;
pub mod types;

// Re-export primary public API
pub use diff::unified_diff;
pub use error::{LoadError, SyntaxError};
pub use loader::load;
pub use managed::{GO_RULES, ManagedRules};
pub use parser::{parse, parse_bytes};
pub use printer::format;
pub use reconcile::{Reconciler, reconcile};
pub use types::{Arg, ArgKind, Call, Comments, Expr, File, Load, LoadSymbol, Opaque, Stmt};
