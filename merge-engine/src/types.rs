//! Build file tree.
//!
//! A BUILD file is an ordered list of top-level statements. Every node that can
//! carry comments owns its own [`Comments`], so replacing one sub-node (say, the
//! value of a keyword argument) never disturbs the comments of its neighbours.
//!
//! Node taxonomy:
//! - **Call**: `kind(args...)`; at top level this is a rule, a `package()`
//!   declaration, or any other macro invocation
//! - **Load**: `load("<module>", "symbol", alias = "symbol")`
//! - **Opaque**: anything else, kept verbatim (assignments, `def`, comment blocks)

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// Comments attached to a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Whole-line comments directly above the node.
    pub before: Vec<String>,
    /// Comment trailing the node on its last line.
    pub suffix: Option<String>,
    /// Whole-line comments after the node's last child, before its closing
    /// bracket (or after the last statement, for a file).
    pub after: Vec<String>,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.suffix.is_none() && self.after.is_empty()
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Identifier or keyword literal (`True`, `None`).
    Ident(String),
    /// String literal, holding the unquoted value.
    Str(String),
    Number(String),
    List(ListExpr),
    Dict(DictExpr),
    Call(Box<Call>),
    /// Attribute access: `object.name`.
    Dot { object: Box<Expr>, name: String },
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    /// Verbatim source for constructs outside the modeled subset.
    Raw(String),
}

impl Expr {
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    /// A compact list of string literals.
    pub fn string_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::List(ListExpr {
            items: values
                .into_iter()
                .map(|v| Item::new(Expr::Str(v.into())))
                .collect(),
            ..Default::default()
        })
    }

    /// Build an identifier, or a chain of attribute accesses for dotted names
    /// such as `native.cc_library`.
    pub fn dotted(name: &str) -> Self {
        let mut parts = name.split('.');
        let first = Expr::Ident(parts.next().unwrap_or_default().to_string());
        parts.fold(first, |object, part| Expr::Dot {
            object: Box::new(object),
            name: part.to_string(),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The dotted name this expression spells, if it is an identifier or an
    /// attribute chain rooted at one.
    pub fn dotted_name(&self) -> Option<Cow<'_, str>> {
        match self {
            Expr::Ident(name) => Some(Cow::Borrowed(name)),
            Expr::Dot { object, name } => {
                let prefix = object.dotted_name()?;
                Some(Cow::Owned(format!("{prefix}.{name}")))
            }
            _ => None,
        }
    }

    /// Whether printing this expression takes more than one line.
    pub fn is_multiline(&self) -> bool {
        match self {
            Expr::List(list) => list.is_multiline(),
            Expr::Dict(dict) => dict.is_multiline(),
            Expr::Call(call) => call.is_multiline(),
            Expr::Dot { object, .. } => object.is_multiline(),
            Expr::Binary { left, right, .. } => left.is_multiline() || right.is_multiline(),
            Expr::Raw(text) => text.contains('\n'),
            Expr::Ident(_) | Expr::Str(_) | Expr::Number(_) => false,
        }
    }
}

/// A list element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub value: Expr,
    pub comments: Comments,
}

impl Item {
    pub fn new(value: Expr) -> Self {
        Self {
            value,
            comments: Comments::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListExpr {
    pub items: Vec<Item>,
    /// Only `after` is meaningful: comments before the closing bracket.
    pub comments: Comments,
    /// The list spanned several lines in its source.
    pub multiline: bool,
}

impl ListExpr {
    pub fn is_multiline(&self) -> bool {
        self.multiline
            || !self.comments.after.is_empty()
            || self
                .items
                .iter()
                .any(|i| !i.comments.is_empty() || i.value.is_multiline())
    }
}

/// A `key: value` dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub key: Expr,
    pub value: Expr,
    pub comments: Comments,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictExpr {
    pub entries: Vec<DictEntry>,
    pub comments: Comments,
    pub multiline: bool,
}

impl DictExpr {
    pub fn is_multiline(&self) -> bool {
        self.multiline
            || !self.comments.after.is_empty()
            || self.entries.iter().any(|e| {
                !e.comments.is_empty() || e.key.is_multiline() || e.value.is_multiline()
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Positional(Expr),
    Keyword { name: String, value: Expr },
}

/// A call argument. Comments belong to the argument as a whole, so swapping a
/// keyword argument's value keeps them in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub kind: ArgKind,
    pub comments: Comments,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self {
            kind: ArgKind::Positional(value),
            comments: Comments::default(),
        }
    }

    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Self {
            kind: ArgKind::Keyword {
                name: name.into(),
                value,
            },
            comments: Comments::default(),
        }
    }

    pub fn keyword_name(&self) -> Option<&str> {
        match &self.kind {
            ArgKind::Keyword { name, .. } => Some(name),
            ArgKind::Positional(_) => None,
        }
    }

    pub fn value(&self) -> &Expr {
        match &self.kind {
            ArgKind::Positional(value) | ArgKind::Keyword { value, .. } => value,
        }
    }

    pub fn value_mut(&mut self) -> &mut Expr {
        match &mut self.kind {
            ArgKind::Positional(value) | ArgKind::Keyword { value, .. } => value,
        }
    }
}

/// A function call. At top level, a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub func: Expr,
    pub args: Vec<Arg>,
    /// `before`/`suffix` are statement comments when the call is top level;
    /// `after` holds comments before the closing parenthesis.
    pub comments: Comments,
    /// The argument list spanned several lines in its source.
    pub multiline: bool,
}

impl Call {
    pub fn new(kind: &str) -> Self {
        Self {
            func: Expr::dotted(kind),
            args: Vec::new(),
            comments: Comments::default(),
            multiline: false,
        }
    }

    /// A rule call with only a `name` attribute, laid out one attribute per line.
    pub fn rule(kind: &str, name: &str) -> Self {
        let mut call = Self::new(kind);
        call.multiline = true;
        call.set_attr("name", Expr::string(name));
        call
    }

    /// The rule kind: the called function's (possibly dotted) name, or the
    /// empty string when the callee is not a name.
    pub fn kind(&self) -> Cow<'_, str> {
        self.func.dotted_name().unwrap_or(Cow::Borrowed(""))
    }

    pub fn set_kind(&mut self, kind: &str) {
        if self.kind() != kind {
            self.func = Expr::dotted(kind);
        }
    }

    /// The value of the `name` attribute, when it is a string literal.
    pub fn name(&self) -> Option<&str> {
        self.attr_string("name")
    }

    /// The keyword argument defining `key`.
    pub fn attr_defn(&self, key: &str) -> Option<&Arg> {
        self.args.iter().find(|a| a.keyword_name() == Some(key))
    }

    pub fn attr(&self, key: &str) -> Option<&Expr> {
        self.attr_defn(key).map(Arg::value)
    }

    pub fn attr_string(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Expr::as_str)
    }

    /// Set `key` to `value`. An existing definition keeps its position and its
    /// comments; only the value is swapped. A new definition is appended.
    pub fn set_attr(&mut self, key: &str, value: Expr) {
        match self.args.iter_mut().find(|a| a.keyword_name() == Some(key)) {
            Some(arg) => *arg.value_mut() = value,
            None => self.args.push(Arg::keyword(key, value)),
        }
    }

    /// Remove every definition of `key`, returning the first removed value.
    pub fn del_attr(&mut self, key: &str) -> Option<Expr> {
        let mut removed = None;
        let mut kept = Vec::with_capacity(self.args.len());
        for arg in self.args.drain(..) {
            if arg.keyword_name() == Some(key) {
                if removed.is_none() {
                    removed = Some(arg.kind);
                }
            } else {
                kept.push(arg);
            }
        }
        self.args = kept;
        match removed {
            Some(ArgKind::Keyword { value, .. }) => Some(value),
            _ => None,
        }
    }

    pub fn positional(&self) -> impl Iterator<Item = &Expr> {
        self.args.iter().filter_map(|a| match &a.kind {
            ArgKind::Positional(value) => Some(value),
            ArgKind::Keyword { .. } => None,
        })
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
            || !self.comments.after.is_empty()
            || self
                .args
                .iter()
                .any(|a| !a.comments.is_empty() || a.value().is_multiline())
    }
}

/// One symbol imported by a `load` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSymbol {
    /// Name bound in this file.
    pub local: String,
    /// Name exported by the loaded module.
    pub original: String,
    pub comments: Comments,
}

impl LoadSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            local: name.clone(),
            original: name,
            comments: Comments::default(),
        }
    }
}

/// A `load` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Load {
    pub module: String,
    pub symbols: Vec<LoadSymbol>,
    pub comments: Comments,
}

impl Load {
    pub fn new<I, S>(module: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            module: module.into(),
            symbols: symbols.into_iter().map(LoadSymbol::new).collect(),
            comments: Comments::default(),
        }
    }

    /// The module identifier (label of the `.bzl` file) being loaded.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Local names in declaration order.
    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.local.as_str())
    }

    /// Recognize `load("<module>", ...)`. Returns `None` for calls that do not
    /// fit the statement's shape, which then stay plain calls.
    pub fn from_call(call: &Call) -> Option<Self> {
        if call.kind() != "load" {
            return None;
        }
        let (first, rest) = call.args.split_first()?;
        let ArgKind::Positional(Expr::Str(module)) = &first.kind else {
            return None;
        };
        if !first.comments.is_empty() {
            return None;
        }
        let symbols = rest
            .iter()
            .map(|arg| {
                let (local, original) = match &arg.kind {
                    ArgKind::Positional(Expr::Str(name)) => (name.clone(), name.clone()),
                    ArgKind::Keyword {
                        name,
                        value: Expr::Str(original),
                    } => (name.clone(), original.clone()),
                    _ => return None,
                };
                Some(LoadSymbol {
                    local,
                    original,
                    comments: arg.comments.clone(),
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            module: module.clone(),
            symbols,
            comments: call.comments.clone(),
        })
    }

    /// The equivalent call expression, used for printing.
    pub fn to_call(&self) -> Call {
        let mut call = Call::new("load");
        call.args.push(Arg::positional(Expr::string(&self.module)));
        for symbol in &self.symbols {
            let mut arg = if symbol.local == symbol.original {
                Arg::positional(Expr::string(&symbol.original))
            } else {
                Arg::keyword(&symbol.local, Expr::string(&symbol.original))
            };
            arg.comments = symbol.comments.clone();
            call.args.push(arg);
        }
        call.comments = self.comments.clone();
        call
    }
}

/// A statement kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub text: String,
    pub comments: Comments,
}

impl Opaque {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            comments: Comments::default(),
        }
    }

    /// A free-standing block of comment lines.
    pub fn comment_block(lines: Vec<String>) -> Self {
        Self::new(lines.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Call(Call),
    Load(Load),
    Opaque(Opaque),
}

impl Stmt {
    pub fn comments(&self) -> &Comments {
        match self {
            Stmt::Call(call) => &call.comments,
            Stmt::Load(load) => &load.comments,
            Stmt::Opaque(opaque) => &opaque.comments,
        }
    }

    pub fn comments_mut(&mut self) -> &mut Comments {
        match self {
            Stmt::Call(call) => &mut call.comments,
            Stmt::Load(load) => &mut load.comments,
            Stmt::Opaque(opaque) => &mut opaque.comments,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Stmt::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_call_mut(&mut self) -> Option<&mut Call> {
        match self {
            Stmt::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_load(&self) -> Option<&Load> {
        match self {
            Stmt::Load(load) => Some(load),
            _ => None,
        }
    }

    pub fn is_package(&self) -> bool {
        self.as_call().is_some_and(|c| c.kind() == "package")
    }

    /// The module a load statement imports from. Also recognizes `load` calls
    /// that did not fit [`Load`]'s shape, as long as the module is a string.
    pub fn load_module(&self) -> Option<&str> {
        match self {
            Stmt::Load(load) => Some(load.module()),
            Stmt::Call(call) if call.kind() == "load" => {
                call.positional().next().and_then(Expr::as_str)
            }
            _ => None,
        }
    }
}

/// A parsed build file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: PathBuf,
    pub stmts: Vec<Stmt>,
    /// Only `after` is used: comments following the last statement.
    pub comments: Comments,
}

impl File {
    /// A file with no statements, anchored to `path`.
    pub fn empty(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stmts: Vec::new(),
            comments: Comments::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty() && self.comments.is_empty()
    }

    /// Top-level calls in file order, restricted to `kind` when given.
    pub fn rules(&self, kind: Option<&str>) -> impl Iterator<Item = &Call> {
        self.stmts
            .iter()
            .filter_map(Stmt::as_call)
            .filter(move |c| kind.is_none_or(|k| c.kind() == k))
    }

    pub fn rules_mut(&mut self, kind: Option<&str>) -> impl Iterator<Item = &mut Call> {
        self.stmts
            .iter_mut()
            .filter_map(Stmt::as_call_mut)
            .filter(move |c| kind.is_none_or(|k| c.kind() == k))
    }

    /// The rule of any kind named `name`.
    pub fn rule(&self, name: &str) -> Option<&Call> {
        self.rules(None).find(|c| c.name() == Some(name))
    }

    /// Delete every top-level rule of `kind` named `name` (a rule without a
    /// `name` attribute has the empty name). Returns how many were removed.
    pub fn del_rules(&mut self, kind: &str, name: &str) -> usize {
        let before = self.stmts.len();
        self.stmts.retain(|stmt| match stmt.as_call() {
            Some(call) => !(call.kind() == kind && call.name().unwrap_or_default() == name),
            None => true,
        });
        before - self.stmts.len()
    }

    /// Index of the first `package()` declaration.
    pub fn package_index(&self) -> Option<usize> {
        self.stmts.iter().position(Stmt::is_package)
    }

    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.stmts.iter().filter_map(Stmt::as_load)
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::printer::format(self))
    }
}
