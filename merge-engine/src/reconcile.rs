//! Reconciliation of a generated rule set into an existing build file.
//!
//! The existing tree is mutated in place, in two passes:
//!
//! 1. **Load pass**: the `load` statement for the managed rules module is
//!    recomputed from the generated rule kinds and placed directly after the
//!    `package()` declaration (or first, when there is none). Stale copies of
//!    it are dropped.
//! 2. **Rule pass**: managed rules are matched to generated rules by name.
//!    Matches are updated in place, unmatched existing rules are pruned, and
//!    generated rules without a match are appended.
//!
//! Rules of unmanaged kinds and attributes outside the managed set are never
//! modified, moved or removed.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use crate::error::LoadError;
use crate::loader;
use crate::managed::{GO_RULES, ManagedRules};
use crate::types::{Call, File, Load, Stmt};

/// Reconcile `generated` into the build file at `path` using the Go rule set.
pub fn reconcile(path: impl AsRef<Path>, generated: &File) -> Result<File, LoadError> {
    Reconciler::default().reconcile(path, generated)
}

/// Merges generated rules into existing build files for one managed rule set.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    rules: &'static ManagedRules,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(&GO_RULES)
    }
}

impl Reconciler {
    pub fn new(rules: &'static ManagedRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'static ManagedRules {
        self.rules
    }

    /// Load the build file at `path` and merge `generated` into it. The
    /// returned tree is ready to be formatted and written back.
    pub fn reconcile(&self, path: impl AsRef<Path>, generated: &File) -> Result<File, LoadError> {
        let mut existing = loader::load(path)?;
        self.reconcile_file(&mut existing, generated);
        Ok(existing)
    }

    /// Merge `generated` into an already loaded tree.
    pub fn reconcile_file(&self, dest: &mut File, generated: &File) {
        self.reconcile_load(dest, generated);
        self.reconcile_rules(dest, generated);
    }

    /// Match rules by name, update matches, prune stale managed rules and
    /// append new ones in generated order.
    pub fn reconcile_rules(&self, dest: &mut File, generated: &File) {
        let mut existing: HashMap<String, usize> = HashMap::new();
        for (idx, stmt) in dest.stmts.iter().enumerate() {
            let Some(rule) = stmt.as_call() else {
                continue;
            };
            if !self.rules.is_managed_kind(&rule.kind()) {
                continue;
            }
            match existing.entry(rule.name().unwrap_or_default().to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(idx);
                }
                Entry::Occupied(slot) => {
                    tracing::warn!(
                        path = %dest.path.display(),
                        name = %slot.key(),
                        kind = %rule.kind(),
                        "duplicate rule name; only the first rule with this name is reconciled"
                    );
                }
            }
        }

        let mut staged = Vec::new();
        for rule in generated.rules(None) {
            let name = rule.name().unwrap_or_default();
            let matched = existing
                .remove(name)
                .and_then(|idx| dest.stmts.get_mut(idx))
                .and_then(Stmt::as_call_mut);
            match matched {
                Some(existing_rule) => {
                    tracing::debug!(name, kind = %rule.kind(), "updating rule");
                    self.reconcile_rule(existing_rule, rule);
                }
                None => {
                    tracing::debug!(name, kind = %rule.kind(), "adding rule");
                    staged.push(Stmt::Call(rule.clone()));
                }
            }
        }

        let mut stale: Vec<(usize, String, String)> = existing
            .into_iter()
            .filter_map(|(name, idx)| {
                let kind = dest.stmts.get(idx)?.as_call()?.kind().into_owned();
                Some((idx, kind, name))
            })
            .collect();
        stale.sort_unstable();
        for (_, kind, name) in stale {
            tracing::debug!(name = %name, kind = %kind, "removing stale rule");
            dest.del_rules(&kind, &name);
        }

        dest.stmts.extend(staged);
    }

    /// Update one matched rule: the kind and every managed attribute follow
    /// `generated`; everything else stays as it is.
    pub fn reconcile_rule(&self, dest: &mut Call, generated: &Call) {
        dest.set_kind(&generated.kind());
        for &attr in self.rules.attrs {
            match generated.attr(attr) {
                Some(value) => dest.set_attr(attr, value.clone()),
                None => {
                    dest.del_attr(attr);
                }
            }
        }
    }

    /// Replace every `load` of the managed rules module with a single freshly
    /// computed one, placed right after the `package()` declaration.
    ///
    /// Comments attached to the first replaced `load` move to the new one,
    /// except the lines above a `load` that preceded `package()`: those stay
    /// where they were, on the statement that follows.
    pub fn reconcile_load(&self, dest: &mut File, generated: &File) {
        let package = dest.package_index();
        let mut carried = None;
        let mut header = Vec::new();
        let mut stmts = Vec::with_capacity(dest.stmts.len() + 1);
        for (idx, mut stmt) in std::mem::take(&mut dest.stmts).into_iter().enumerate() {
            if stmt.load_module() == Some(self.rules.source) {
                let mut comments = stmt.comments().clone();
                if package.is_some_and(|package| idx < package) {
                    header.append(&mut comments.before);
                }
                carried.get_or_insert(comments);
                continue;
            }
            if !header.is_empty() {
                let before = &mut stmt.comments_mut().before;
                header.append(before);
                *before = std::mem::take(&mut header);
            }
            stmts.push(stmt);
        }

        let split = stmts
            .iter()
            .position(Stmt::is_package)
            .map_or(0, |idx| idx + 1);
        let tail = stmts.split_off(split);

        if let Some(mut load) = self.generate_load(generated) {
            if let Some(comments) = carried {
                load.comments = comments;
            }
            stmts.push(Stmt::Load(load));
        }
        stmts.extend(tail);
        dest.stmts = stmts;
    }

    /// The `load` statement `generated` needs: one symbol per managed kind it
    /// uses, in declared order. `None` when no managed kind is used.
    pub fn generate_load(&self, generated: &File) -> Option<Load> {
        let symbols: Vec<&str> = self
            .rules
            .kinds
            .iter()
            .copied()
            .filter(|&kind| generated.rules(Some(kind)).next().is_some())
            .collect();
        if symbols.is_empty() {
            return None;
        }
        Some(Load::new(self.rules.source, symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::printer::format;

    const GO_DEF: &str = "@io_bazel_rules_go//go:def.bzl";

    fn parse_build(src: &str) -> File {
        parse("BUILD", src).unwrap()
    }

    fn assert_reconciled(
        pass: impl Fn(&Reconciler, &mut File, &File),
        dest: &str,
        generated: &str,
        want: &str,
    ) {
        let mut dest = parse_build(dest);
        let generated = parse_build(generated);
        pass(&Reconciler::default(), &mut dest, &generated);
        assert_eq!(format(&dest), format(&parse_build(want)));
    }

    #[test]
    fn test_load_added_to_empty_file() {
        assert_reconciled(
            Reconciler::reconcile_load,
            "",
            "go_library(name = \"foo\")\n",
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")\n",
        );
    }

    #[test]
    fn test_load_symbols_follow_declared_order() {
        assert_reconciled(
            Reconciler::reconcile_load,
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_prefix\")\n",
            "go_library(name = \"foo\")\n\ngo_prefix(\"example.com/foo\")\n",
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_prefix\", \"go_library\")\n",
        );
    }

    #[test]
    fn test_load_placed_after_package() {
        assert_reconciled(
            Reconciler::reconcile_load,
            r#"package(default_visibility = ["//visibility:public"])

cc_library(
    name = "foo",
    srcs = ["foo.cc"],
)
"#,
            "go_prefix(\"example.com/foo\")\n",
            r#"package(default_visibility = ["//visibility:public"])

load("@io_bazel_rules_go//go:def.bzl", "go_prefix")

cc_library(
    name = "foo",
    srcs = ["foo.cc"],
)
"#,
        );
    }

    #[test]
    fn test_load_moves_to_top_and_deduplicates() {
        assert_reconciled(
            Reconciler::reconcile_load,
            r#"load("//tools:defs.bzl", "helper")

load("@io_bazel_rules_go//go:def.bzl", "go_binary")

helper(name = "h")

load("@io_bazel_rules_go//go:def.bzl", "go_test")
"#,
            "go_binary(name = \"b\")\n\ngo_test(name = \"t\")\n",
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_binary", "go_test")

load("//tools:defs.bzl", "helper")

helper(name = "h")
"#,
        );
    }

    #[test]
    fn test_load_removed_without_managed_rules() {
        assert_reconciled(
            Reconciler::reconcile_load,
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_library")

sh_binary(name = "tool")
"#,
            "",
            "sh_binary(name = \"tool\")\n",
        );
    }

    #[test]
    fn test_load_keeps_comments_of_replaced_load() {
        assert_reconciled(
            Reconciler::reconcile_load,
            "# Go rules.\nload(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")  # keep\n",
            "go_test(name = \"t\")\n",
            "# Go rules.\nload(\"@io_bazel_rules_go//go:def.bzl\", \"go_test\")  # keep\n",
        );
    }

    #[test]
    fn test_load_before_package_leaves_header_comment() {
        assert_reconciled(
            Reconciler::reconcile_load,
            r#"# Header for this package.
load("@io_bazel_rules_go//go:def.bzl", "go_library")  # go rules

package(default_visibility = ["//visibility:public"])

go_library(name = "foo")
"#,
            "go_library(name = \"foo\")\n",
            r#"# Header for this package.
package(default_visibility = ["//visibility:public"])

load("@io_bazel_rules_go//go:def.bzl", "go_library")  # go rules

go_library(name = "foo")
"#,
        );
    }

    #[test]
    fn test_unmodelled_escapes_survive_reconcile() {
        assert_reconciled(
            Reconciler::reconcile_file,
            r#"go_library(
    name = "foo",
    srcs = ["a.go"],
    x_defs = {"K": "\x41", "O": "\101"},
)
"#,
            "go_library(name = \"foo\", srcs = [\"a.go\"])\n",
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_library")

go_library(
    name = "foo",
    srcs = ["a.go"],
    x_defs = {"K": "\x41", "O": "\101"},
)
"#,
        );
        let mut dest = parse_build("go_library(name = \"foo\", tag = \"\\u00e9\\a\")\n");
        Reconciler::default().reconcile_rules(&mut dest, &parse_build("go_library(name = \"foo\")\n"));
        assert!(format(&dest).contains(r#"tag = "\u00e9\a""#));
    }

    #[test]
    fn test_rules_appended_after_unmanaged() {
        assert_reconciled(
            Reconciler::reconcile_rules,
            r#"cc_library(
    name = "a",
    srcs = ["a.cc"],
)
"#,
            r#"go_library(
    name = "foo",
    srcs = ["foo.go"],
)
"#,
            r#"cc_library(
    name = "a",
    srcs = ["a.cc"],
)

go_library(
    name = "foo",
    srcs = ["foo.go"],
)
"#,
        );
    }

    #[test]
    fn test_rule_updated_in_place() {
        assert_reconciled(
            Reconciler::reconcile_rules,
            r#"cc_library(
    name = "a",
    srcs = ["a.cc"],
)

go_library(
    name = "foo",
    srcs = ["foo.go"],
)

cc_library(
    name = "b",
    srcs = ["b.cc"],
)
"#,
            r#"go_library(
    name = "foo",
    srcs = ["foo.go", "bar.go"],
)
"#,
            r#"cc_library(
    name = "a",
    srcs = ["a.cc"],
)

go_library(
    name = "foo",
    srcs = ["foo.go", "bar.go"],
)

cc_library(
    name = "b",
    srcs = ["b.cc"],
)
"#,
        );
    }

    #[test]
    fn test_unmanaged_attributes_preserved() {
        assert_reconciled(
            Reconciler::reconcile_rules,
            r#"go_library(
    name = "foo",
    srcs = ["foo.go", "bar.go"],  # some note
    deps = [":baz"],
    visibility = ["//example:__package__"],
    licenses = ["reciprocal"],  # MIT
)
"#,
            r#"go_library(
    name = "foo",
    srcs = ["foo.go"],
)
"#,
            r#"go_library(
    name = "foo",
    srcs = ["foo.go"],  # some note
    visibility = ["//example:__package__"],
    licenses = ["reciprocal"],  # MIT
)
"#,
        );
    }

    #[test]
    fn test_stale_rule_pruned() {
        assert_reconciled(
            Reconciler::reconcile_rules,
            r#"go_library(
    name = "a",
    srcs = ["a.go"],
)

go_library(
    name = "b",
    srcs = ["b.go"],
)
"#,
            r#"go_library(
    name = "a",
    srcs = ["a.go", "a2.go"],
)
"#,
            r#"go_library(
    name = "a",
    srcs = ["a.go", "a2.go"],
)
"#,
        );
    }

    #[test]
    fn test_kind_change_keeps_position() {
        assert_reconciled(
            Reconciler::reconcile_rules,
            r#"go_library(
    name = "cmd",
    srcs = ["main.go"],
    visibility = ["//visibility:public"],
)

sh_test(name = "smoke")
"#,
            r#"go_binary(
    name = "cmd",
    srcs = ["main.go"],
)
"#,
            r#"go_binary(
    name = "cmd",
    srcs = ["main.go"],
    visibility = ["//visibility:public"],
)

sh_test(name = "smoke")
"#,
        );
    }

    #[test]
    fn test_unmanaged_rule_with_colliding_name_untouched() {
        let mut dest = parse_build("cc_library(name = \"foo\", srcs = [\"foo.cc\"])\n");
        let generated = parse_build("go_library(name = \"foo\", srcs = [\"foo.go\"])\n");
        Reconciler::default().reconcile_rules(&mut dest, &generated);

        let kinds: Vec<_> = dest.rules(None).map(|r| r.kind().into_owned()).collect();
        assert_eq!(kinds, ["cc_library", "go_library"]);
        let cc = dest.rules(Some("cc_library")).next().unwrap();
        assert_eq!(cc.attr("srcs"), Some(&crate::types::Expr::string_list(["foo.cc"])));
    }

    #[test]
    fn test_duplicate_names_first_rule_wins() {
        let mut dest = parse_build(
            "go_library(name = \"foo\", srcs = [\"a.go\"])\n\ngo_test(name = \"foo\", srcs = [\"a_test.go\"])\n",
        );
        let generated = parse_build("go_library(name = \"foo\", srcs = [\"b.go\"])\n");
        Reconciler::default().reconcile_rules(&mut dest, &generated);

        let rules: Vec<_> = dest.rules(None).collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[0].attr("srcs"),
            Some(&crate::types::Expr::string_list(["b.go"]))
        );
        assert_eq!(
            rules[1].attr("srcs"),
            Some(&crate::types::Expr::string_list(["a_test.go"]))
        );
    }

    #[test]
    fn test_reconcile_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD");
        let generated = parse_build("go_library(\n    name = \"foo\",\n    srcs = [\"foo.go\"],\n)\n");

        let merged = reconcile(&path, &generated).unwrap();

        assert_eq!(merged.path, path);
        assert_eq!(
            format(&merged),
            format!(
                "load(\"{GO_DEF}\", \"go_library\")\n\ngo_library(\n    name = \"foo\",\n    srcs = [\"foo.go\"],\n)\n"
            )
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD");
        std::fs::write(
            &path,
            r#"# Hand-written header.

package(default_visibility = ["//visibility:private"])

cc_library(name = "native")

go_library(
    name = "old",
    srcs = ["old.go"],
)

go_library(
    name = "foo",
    srcs = ["foo.go"],
    tags = ["manual"],  # keep me
)
"#,
        )
        .unwrap();
        let generated = parse_build(
            r#"go_prefix("example.com/foo")

go_library(
    name = "foo",
    srcs = ["foo.go", "util.go"],
    deps = ["//lib:go_default_library"],
)

go_test(
    name = "foo_test",
    srcs = ["foo_test.go"],
    library = ":foo",
)
"#,
        );

        let first = format(&reconcile(&path, &generated).unwrap());
        std::fs::write(&path, &first).unwrap();
        let second = format(&reconcile(&path, &generated).unwrap());

        assert_eq!(first, second);
        assert_eq!(
            first,
            format(&parse_build(
                r#"# Hand-written header.

package(default_visibility = ["//visibility:private"])

load("@io_bazel_rules_go//go:def.bzl", "go_prefix", "go_library", "go_test")

cc_library(name = "native")

go_library(
    name = "foo",
    srcs = ["foo.go", "util.go"],
    tags = ["manual"],  # keep me
    deps = ["//lib:go_default_library"],
)

go_prefix("example.com/foo")

go_test(
    name = "foo_test",
    srcs = ["foo_test.go"],
    library = ":foo",
)
"#
            ))
        );
    }

    #[test]
    fn test_reconcile_propagates_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD");
        std::fs::write(&path, "go_library(name = \"foo\"\n").unwrap();
        let err = reconcile(&path, &File::empty(&path)).unwrap_err();
        assert!(matches!(err, LoadError::Syntax(_)));
    }

    #[test]
    fn test_generate_load_none_for_unmanaged() {
        let generated = parse_build("cc_library(name = \"x\")\n");
        assert_eq!(Reconciler::default().generate_load(&generated), None);
        assert_eq!(Reconciler::default().rules().source, GO_DEF);
    }
}
