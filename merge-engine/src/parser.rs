//! Tree-sitter based BUILD file parser.
//!
//! Starlark's BUILD dialect is a syntactic subset of Python, so we parse with
//! the tree-sitter Python grammar and lower its concrete syntax tree into our
//! [`File`] model. Constructs the model does not break down (assignments,
//! `def`, comprehensions) are carried as verbatim text.
//!
//! Comments are tree-sitter "extras" and can appear anywhere among a node's
//! children. We attach them by position while walking each sequence:
//! - a comment on the line where the previous element ends is its suffix
//! - a comment on its own line goes before the next element
//! - comments left over at the end belong to the enclosing node

use std::path::Path;

use tree_sitter::Node;

use crate::error::SyntaxError;
use crate::types::{
    Arg, Call, Comments, DictEntry, DictExpr, Expr, File, Item, ListExpr, Load, Opaque, Stmt,
};

/// Parse BUILD file source into a tree anchored at `path`.
pub fn parse(path: impl AsRef<Path>, source: &str) -> Result<File, SyntaxError> {
    let path = path.as_ref();
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| SyntaxError::new(path, 1, 1, format!("language error: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| SyntaxError::new(path, 1, 1, "parse failed"))?;

    let root = tree.root_node();
    if root.has_error() {
        let bad = first_error(root).unwrap_or(root);
        let pos = bad.start_position();
        let message = if bad.is_missing() {
            format!("missing {}", bad.kind())
        } else {
            let text = bad.utf8_text(source.as_bytes()).unwrap_or("");
            let token = text.lines().next().unwrap_or("").trim();
            format!("unexpected {token:?}")
        };
        return Err(SyntaxError::new(path, pos.row + 1, pos.column + 1, message));
    }

    let lowering = Lowering {
        source: source.as_bytes(),
    };
    let (stmts, comments) = lowering.module(root);
    Ok(File {
        path: path.to_path_buf(),
        stmts,
        comments,
    })
}

/// Parse raw file contents, rejecting input that is not UTF-8.
pub fn parse_bytes(path: impl AsRef<Path>, bytes: &[u8]) -> Result<File, SyntaxError> {
    let path = path.as_ref();
    match std::str::from_utf8(bytes) {
        Ok(source) => parse(path, source),
        Err(e) => {
            let valid = &bytes[..e.valid_up_to()];
            let line = valid.iter().filter(|&&b| b == b'\n').count() + 1;
            let line_start = valid.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
            Err(SyntaxError::new(
                path,
                line,
                valid.len() - line_start + 1,
                "invalid UTF-8",
            ))
        }
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    children(node)
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .collect()
}

fn is_comment(node: &Node<'_>) -> bool {
    node.kind() == "comment"
}

fn spans_lines(node: &Node<'_>) -> bool {
    node.start_position().row != node.end_position().row
}

struct Lowering<'a> {
    source: &'a [u8],
}

impl Lowering<'_> {
    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    fn comment(&self, node: Node<'_>) -> String {
        self.text(node).trim_end().to_string()
    }

    /// Comments that are direct children of `node`.
    fn inner_comments(&self, node: Node<'_>) -> Vec<String> {
        children(node)
            .into_iter()
            .filter(is_comment)
            .map(|c| self.comment(c))
            .collect()
    }

    fn module(&self, root: Node<'_>) -> (Vec<Stmt>, Comments) {
        let mut stmts: Vec<Stmt> = Vec::new();
        let mut pending: Vec<(usize, String)> = Vec::new();
        let mut last_end: Option<usize> = None;

        for node in children(root) {
            if is_comment(&node) {
                let row = node.start_position().row;
                let text = self.comment(node);
                if pending.is_empty() && last_end == Some(row) {
                    if let Some(comments) = stmts.last_mut().map(Stmt::comments_mut) {
                        if comments.suffix.is_none() {
                            comments.suffix = Some(text);
                            continue;
                        }
                    }
                }
                pending.push((row, text));
                continue;
            }
            if !node.is_named() {
                continue;
            }

            // A comment block separated from the statement by a blank line
            // stands on its own.
            let start = node.start_position().row;
            if pending.last().is_some_and(|&(row, _)| row + 1 < start) {
                let lines = pending.drain(..).map(|(_, text)| text).collect();
                stmts.push(Stmt::Opaque(Opaque::comment_block(lines)));
            }

            let mut stmt = self.statement(node);
            stmt.comments_mut().before = pending.drain(..).map(|(_, text)| text).collect();
            last_end = Some(node.end_position().row);
            stmts.push(stmt);
        }

        let comments = Comments {
            after: pending.into_iter().map(|(_, text)| text).collect(),
            ..Default::default()
        };
        (stmts, comments)
    }

    fn statement(&self, node: Node<'_>) -> Stmt {
        if node.kind() == "expression_statement" {
            let exprs: Vec<Node<'_>> = children(node)
                .into_iter()
                .filter(|c| c.is_named() && !is_comment(c))
                .collect();
            if let [expr] = exprs.as_slice() {
                if expr.kind() == "call" && exprs.len() == children(node).len() {
                    if let Some(call) = self.call(*expr) {
                        return match Load::from_call(&call) {
                            Some(load) => Stmt::Load(load),
                            None => Stmt::Call(call),
                        };
                    }
                }
            }
        }
        Stmt::Opaque(Opaque::new(self.text(node)))
    }

    fn call(&self, node: Node<'_>) -> Option<Call> {
        let func = node.child_by_field_name("function")?;
        let arguments = node.child_by_field_name("arguments")?;
        if arguments.kind() != "argument_list" || children(node).iter().any(is_comment) {
            return None;
        }

        let (items, after) = self.sequence(arguments, |this, n| this.arg(n));
        let args = items
            .into_iter()
            .map(|(mut arg, comments)| {
                let inner = std::mem::replace(&mut arg.comments, comments);
                arg.comments.before.extend(inner.before);
                arg
            })
            .collect();

        Some(Call {
            func: self.expr(func),
            args,
            comments: Comments {
                after,
                ..Default::default()
            },
            multiline: spans_lines(&arguments),
        })
    }

    fn arg(&self, node: Node<'_>) -> Arg {
        if node.kind() == "keyword_argument" {
            if let (Some(name), Some(value)) = (
                node.child_by_field_name("name"),
                node.child_by_field_name("value"),
            ) {
                let mut arg = Arg::keyword(self.text(name), self.expr(value));
                arg.comments.before = self.inner_comments(node);
                return arg;
            }
        }
        Arg::positional(self.expr(node))
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        let lowered = match node.kind() {
            "identifier" | "true" | "false" | "none" => Some(Expr::Ident(self.text(node))),
            "integer" | "float" => Some(Expr::Number(self.text(node))),
            "string" => unquote(&self.text(node)).map(Expr::Str),
            "list" => Some(self.list(node)),
            "dictionary" => self.dict(node),
            "call" => self.call(node).map(|c| Expr::Call(Box::new(c))),
            "attribute" => self.attribute(node),
            "binary_operator" => self.binary(node),
            _ => None,
        };
        lowered.unwrap_or_else(|| Expr::Raw(self.text(node)))
    }

    fn attribute(&self, node: Node<'_>) -> Option<Expr> {
        let object = node.child_by_field_name("object")?;
        let name = node.child_by_field_name("attribute")?;
        if children(node).iter().any(is_comment) {
            return None;
        }
        Some(Expr::Dot {
            object: Box::new(self.expr(object)),
            name: self.text(name),
        })
    }

    fn binary(&self, node: Node<'_>) -> Option<Expr> {
        let left = node.child_by_field_name("left")?;
        let op = node.child_by_field_name("operator")?;
        let right = node.child_by_field_name("right")?;
        if children(node).iter().any(is_comment) || spans_lines(&op) {
            return None;
        }
        Some(Expr::Binary {
            left: Box::new(self.expr(left)),
            op: self.text(op),
            right: Box::new(self.expr(right)),
        })
    }

    fn list(&self, node: Node<'_>) -> Expr {
        let (items, after) = self.sequence(node, |this, n| this.expr(n));
        Expr::List(ListExpr {
            items: items
                .into_iter()
                .map(|(value, comments)| Item { value, comments })
                .collect(),
            comments: Comments {
                after,
                ..Default::default()
            },
            multiline: spans_lines(&node),
        })
    }

    fn dict(&self, node: Node<'_>) -> Option<Expr> {
        let entries_ok = children(node)
            .iter()
            .filter(|c| c.is_named() && !is_comment(c))
            .all(|c| c.kind() == "pair" && !children(*c).iter().any(is_comment));
        if !entries_ok {
            return None;
        }

        let (pairs, after) = self.sequence(node, |this, pair| {
            let key = pair.child_by_field_name("key");
            let value = pair.child_by_field_name("value");
            key.zip(value)
                .map(|(k, v)| (this.expr(k), this.expr(v)))
        });
        let entries = pairs
            .into_iter()
            .map(|(pair, comments)| {
                pair.map(|(key, value)| DictEntry {
                    key,
                    value,
                    comments,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Expr::Dict(DictExpr {
            entries,
            comments: Comments {
                after,
                ..Default::default()
            },
            multiline: spans_lines(&node),
        }))
    }

    /// Lower the named children of a bracketed node, attaching interleaved
    /// comments. Returns the elements with their comments, and the comments
    /// trailing the last element.
    fn sequence<T>(
        &self,
        node: Node<'_>,
        mut lower: impl FnMut(&Self, Node<'_>) -> T,
    ) -> (Vec<(T, Comments)>, Vec<String>) {
        let mut items: Vec<(T, Comments)> = Vec::new();
        let mut pending = Vec::new();
        let mut last_end: Option<usize> = None;

        for child in children(node) {
            if is_comment(&child) {
                let row = child.start_position().row;
                let text = self.comment(child);
                match items.last_mut() {
                    Some((_, comments))
                        if pending.is_empty()
                            && last_end == Some(row)
                            && comments.suffix.is_none() =>
                    {
                        comments.suffix = Some(text);
                    }
                    _ => pending.push(text),
                }
                continue;
            }
            if !child.is_named() {
                continue;
            }
            let item = lower(self, child);
            let comments = Comments {
                before: std::mem::take(&mut pending),
                ..Default::default()
            };
            last_end = Some(child.end_position().row);
            items.push((item, comments));
        }

        (items, pending)
    }
}

/// Decode a string literal token. Returns `None` for byte strings, f-strings,
/// escapes the printer cannot reproduce and anything else whose value is not
/// a plain string; those stay as raw token text.
fn unquote(token: &str) -> Option<String> {
    let prefix_len = token.find(['"', '\''])?;
    let prefix = token[..prefix_len].to_ascii_lowercase();
    if prefix.chars().any(|c| c != 'r') {
        return None;
    }
    let body = &token[prefix_len..];
    let quote = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        &body[..3]
    } else {
        &body[..1]
    };
    if body.len() < 2 * quote.len() || !body.ends_with(quote) {
        return None;
    }
    let inner = &body[quote.len()..body.len() - quote.len()];
    if prefix.is_empty() {
        unescape(inner)
    } else {
        Some(inner.to_string())
    }
}

fn unescape(inner: &str) -> Option<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            // Line continuation.
            Some('\n') => {}
            // Hex, octal, unicode and bell-style escapes.
            _ => return None,
        }
    }
    Some(out)
}
