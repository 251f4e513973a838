//! Tree → text.
//!
//! Layout rules (buildifier-like):
//! - top-level statements are separated by one blank line
//! - a call, list or dict prints on one line unless it spanned several lines
//!   in its source, carries comments, or contains something multi-line; the
//!   multi-line form puts one element per line, indented by four spaces, with
//!   a trailing comma
//! - strings are always double-quoted
//!
//! Printing a parsed file and parsing the output again yields the same tree
//! layout, so `format` is a fixpoint after one pass.

use crate::types::{
    Arg, ArgKind, Call, Comments, DictEntry, DictExpr, Expr, File, Item, ListExpr, Stmt,
};

const INDENT: usize = 4;

/// Render a file. An empty file renders as the empty string.
pub fn format(file: &File) -> String {
    let mut printer = Printer::default();
    printer.file(file);
    printer.out
}

/// Render a single expression as it would appear at top-level indentation.
pub fn format_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, 0);
    printer.out
}

/// Quote a string value as a double-quoted Starlark literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// An element of a bracketed sequence.
trait Element {
    fn comments(&self) -> &Comments;
    fn print(&self, printer: &mut Printer, indent: usize);
}

impl Element for Arg {
    fn comments(&self) -> &Comments {
        &self.comments
    }

    fn print(&self, printer: &mut Printer, indent: usize) {
        match &self.kind {
            ArgKind::Positional(value) => printer.expr(value, indent),
            ArgKind::Keyword { name, value } => {
                printer.out.push_str(name);
                printer.out.push_str(" = ");
                printer.expr(value, indent);
            }
        }
    }
}

impl Element for Item {
    fn comments(&self) -> &Comments {
        &self.comments
    }

    fn print(&self, printer: &mut Printer, indent: usize) {
        printer.expr(&self.value, indent);
    }
}

impl Element for DictEntry {
    fn comments(&self) -> &Comments {
        &self.comments
    }

    fn print(&self, printer: &mut Printer, indent: usize) {
        printer.expr(&self.key, indent);
        printer.out.push_str(": ");
        printer.expr(&self.value, indent);
    }
}

#[derive(Default)]
struct Printer {
    out: String,
}

impl Printer {
    fn file(&mut self, file: &File) {
        for (i, stmt) in file.stmts.iter().enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            self.stmt(stmt);
        }
        if !file.comments.after.is_empty() {
            if !file.stmts.is_empty() {
                self.out.push('\n');
            }
            for comment in &file.comments.after {
                self.line(0, comment);
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        let comments = stmt.comments();
        for comment in &comments.before {
            self.line(0, comment);
        }
        match stmt {
            Stmt::Call(call) => self.call(call, 0),
            Stmt::Load(load) => self.call(&load.to_call(), 0),
            Stmt::Opaque(opaque) => self.out.push_str(opaque.text.trim_end()),
        }
        self.suffix(comments.suffix.as_deref());
        self.out.push('\n');
    }

    fn expr(&mut self, expr: &Expr, indent: usize) {
        match expr {
            Expr::Ident(text) | Expr::Number(text) | Expr::Raw(text) => self.out.push_str(text),
            Expr::Str(value) => self.out.push_str(&quote(value)),
            Expr::List(list) => self.list(list, indent),
            Expr::Dict(dict) => self.dict(dict, indent),
            Expr::Call(call) => self.call(call, indent),
            Expr::Dot { object, name } => {
                self.expr(object, indent);
                self.out.push('.');
                self.out.push_str(name);
            }
            Expr::Binary { left, op, right } => {
                self.expr(left, indent);
                self.out.push(' ');
                self.out.push_str(op);
                self.out.push(' ');
                self.expr(right, indent);
            }
        }
    }

    fn call(&mut self, call: &Call, indent: usize) {
        self.expr(&call.func, indent);
        self.seq(
            ("(", ")"),
            &call.args,
            &call.comments.after,
            call.is_multiline(),
            indent,
        );
    }

    fn list(&mut self, list: &ListExpr, indent: usize) {
        self.seq(
            ("[", "]"),
            &list.items,
            &list.comments.after,
            list.is_multiline(),
            indent,
        );
    }

    fn dict(&mut self, dict: &DictExpr, indent: usize) {
        self.seq(
            ("{", "}"),
            &dict.entries,
            &dict.comments.after,
            dict.is_multiline(),
            indent,
        );
    }

    fn seq<E: Element>(
        &mut self,
        (open, close): (&str, &str),
        elems: &[E],
        after: &[String],
        multiline: bool,
        indent: usize,
    ) {
        self.out.push_str(open);
        if !multiline || (elems.is_empty() && after.is_empty()) {
            for (i, elem) in elems.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                elem.print(self, indent);
            }
            self.out.push_str(close);
            return;
        }

        let inner = indent + INDENT;
        self.out.push('\n');
        for elem in elems {
            let comments = elem.comments();
            for comment in &comments.before {
                self.line(inner, comment);
            }
            self.indent(inner);
            elem.print(self, inner);
            self.out.push(',');
            self.suffix(comments.suffix.as_deref());
            self.out.push('\n');
        }
        for comment in after {
            self.line(inner, comment);
        }
        self.indent(indent);
        self.out.push_str(close);
    }

    fn indent(&mut self, width: usize) {
        self.out.extend(std::iter::repeat_n(' ', width));
    }

    fn line(&mut self, indent: usize, text: &str) {
        self.indent(indent);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn suffix(&mut self, comment: Option<&str>) {
        if let Some(comment) = comment {
            self.out.push_str("  ");
            self.out.push_str(comment);
        }
    }
}
