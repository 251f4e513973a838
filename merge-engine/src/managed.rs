//! The closed set of rule kinds and attributes the generator owns.
//!
//! Everything outside these lists belongs to the user and is never touched by
//! reconciliation.

/// A family of generator-owned rules, all defined in one `.bzl` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedRules {
    /// Label of the module defining the rule kinds.
    pub source: &'static str,
    /// Rule kinds, in the order their symbols appear in the `load` statement.
    pub kinds: &'static [&'static str],
    /// Attributes whose values the generator overwrites or removes.
    pub attrs: &'static [&'static str],
}

/// Go rules from `rules_go`.
pub const GO_RULES: ManagedRules = ManagedRules {
    source: "@io_bazel_rules_go//go:def.bzl",
    kinds: &["go_prefix", "go_library", "go_binary", "go_test"],
    attrs: &["srcs", "deps", "library"],
};

impl ManagedRules {
    pub fn is_managed_kind(&self, kind: &str) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_managed_attr(&self, name: &str) -> bool {
        self.attrs.contains(&name)
    }
}
