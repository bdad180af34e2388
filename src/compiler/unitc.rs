//! The unit-language compiler backend.
//!
//! Grammar, one directive per line:
//!
//! ```text
//! # comment
//! class demo.Post extends kiln.Model
//! field title: string
//! field author: demo.Author
//! method render() = "hello"
//! method title() = this.render()
//! method greet() = demo.Greeter.text()
//! ```
//!
//! A unit declares one top-level class matching its path (first), then
//! any number of classes nested in it (`demo.Post$Meta`). Parsing is
//! per-unit and runs in parallel; the link phase then checks every
//! cross-class reference against the batch plus the caller's known
//! set. Method existence is deliberately not linked - calls bind late,
//! against whatever the class looks like when invoked.

use std::path::PathBuf;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::bytecode::{ClassImage, FieldDecl, MethodBody, MethodDecl};
use crate::core::ClassName;

use super::diagnostics::{CompileFailure, Diagnostic, SourceSpan};
use super::{CompilerBackend, SourceUnit};

/// Primitive field types. Anything else must be a qualified class name.
pub const PRIMITIVE_TYPES: &[&str] = &["string", "int", "bool"];

pub struct UnitCompiler;

impl UnitCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnitCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerBackend for UnitCompiler {
    fn compile_batch(
        &self,
        units: &[SourceUnit],
        is_known: &dyn Fn(&ClassName) -> bool,
    ) -> Result<Vec<Vec<ClassImage>>, CompileFailure> {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        // Units are independent during parsing
        let parsed: Vec<Result<ParsedUnit, Vec<Diagnostic>>> =
            units.par_iter().map(parse_unit).collect();

        let mut diagnostics = Vec::new();
        let mut ok_units = Vec::with_capacity(units.len());
        for result in parsed {
            match result {
                Ok(unit) => ok_units.push(unit),
                Err(errors) => diagnostics.extend(errors),
            }
        }

        // Link only a parse-clean batch: unresolved-reference noise on
        // top of syntax errors helps nobody
        if diagnostics.is_empty() {
            let batch: FxHashSet<&ClassName> = ok_units
                .iter()
                .flat_map(|u| u.classes.iter().map(|c| &c.name))
                .collect();
            for unit in &ok_units {
                for reference in &unit.refs {
                    if batch.contains(&reference.target) || is_known(&reference.target) {
                        continue;
                    }
                    diagnostics.push(Diagnostic::new(
                        reference.file.clone(),
                        reference.span,
                        format!("unresolved reference to `{}`", reference.target),
                        Some(reference.line_text.clone()),
                    ));
                }
            }
        }

        if !diagnostics.is_empty() {
            return Err(CompileFailure::new(diagnostics));
        }
        Ok(ok_units.into_iter().map(|u| u.classes).collect())
    }
}

// =============================================================================
// Per-unit parsing
// =============================================================================

struct ParsedUnit {
    classes: Vec<ClassImage>,
    refs: Vec<ClassRef>,
}

/// A cross-class reference site, kept for link checking.
struct ClassRef {
    target: ClassName,
    file: PathBuf,
    span: SourceSpan,
    line_text: String,
}

fn parse_unit(unit: &SourceUnit) -> Result<ParsedUnit, Vec<Diagnostic>> {
    let mut parser = UnitParser {
        unit,
        classes: Vec::new(),
        refs: Vec::new(),
        errors: Vec::new(),
        line_no: 0,
        line: "",
    };
    for (i, line) in unit.text.lines().enumerate() {
        parser.line_no = i + 1;
        parser.line = line;
        parser.parse_line();
    }
    parser.finish()
}

struct UnitParser<'a> {
    unit: &'a SourceUnit,
    classes: Vec<ClassImage>,
    refs: Vec<ClassRef>,
    errors: Vec<Diagnostic>,
    line_no: usize,
    line: &'a str,
}

impl UnitParser<'_> {
    fn parse_line(&mut self) {
        let trimmed = self.line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }
        let indent = self.line.len() - trimmed.len();
        let keyword = trimmed.split_whitespace().next().unwrap_or_default();
        match keyword {
            "class" => self.parse_class(indent),
            "field" => self.parse_field(indent),
            "method" => self.parse_method(indent),
            other => self.error(
                indent,
                other.chars().count(),
                format!("unknown directive `{other}`, expected `class`, `field` or `method`"),
            ),
        }
    }

    fn parse_class(&mut self, indent: usize) {
        let mut cursor = indent + "class".len();
        let Some((name_start, name_tok)) = next_token(self.line, cursor) else {
            self.error_at_end("expected class name after `class`");
            return;
        };
        cursor = name_start + name_tok.len();
        if !is_class_name(name_tok) {
            self.error(
                name_start,
                name_tok.chars().count(),
                format!("invalid class name `{name_tok}`"),
            );
            return;
        }
        let name = ClassName::new(name_tok);

        if self.classes.is_empty() {
            if name != self.unit.name {
                self.error(
                    name_start,
                    name_tok.chars().count(),
                    format!(
                        "unit must declare `{}` as its first class, found `{}`",
                        self.unit.name, name
                    ),
                );
            }
        } else if self.classes.iter().any(|c| c.name == name) {
            self.error(
                name_start,
                name_tok.chars().count(),
                format!("duplicate class `{name}`"),
            );
            return;
        } else {
            let primary = &self.classes[0].name;
            if !name.is_member_of(primary) {
                self.error(
                    name_start,
                    name_tok.chars().count(),
                    format!(
                        "class `{name}` must be nested in `{primary}` (one top-level class per unit)"
                    ),
                );
                return;
            }
        }

        let superclass = match next_token(self.line, cursor) {
            None => None,
            Some((ext_start, "extends")) => {
                cursor = ext_start + "extends".len();
                let Some((sup_start, sup_tok)) = next_token(self.line, cursor) else {
                    self.error_at_end("expected superclass name after `extends`");
                    return;
                };
                cursor = sup_start + sup_tok.len();
                if !is_class_name(sup_tok) {
                    self.error(
                        sup_start,
                        sup_tok.chars().count(),
                        format!("invalid superclass name `{sup_tok}`"),
                    );
                    return;
                }
                let sup = ClassName::new(sup_tok);
                if sup == name {
                    self.error(
                        sup_start,
                        sup_tok.chars().count(),
                        format!("class `{name}` cannot extend itself"),
                    );
                    return;
                }
                self.record_ref(sup.clone(), sup_start, sup_tok.chars().count());
                Some(sup)
            }
            Some((junk_start, junk)) => {
                self.error(
                    junk_start,
                    junk.chars().count(),
                    format!("expected `extends` or end of line, found `{junk}`"),
                );
                return;
            }
        };
        if let Some((junk_start, junk)) = next_token(self.line, cursor) {
            self.error(
                junk_start,
                junk.chars().count(),
                format!("unexpected token `{junk}` after class declaration"),
            );
            return;
        }

        self.classes.push(ClassImage::new(name, superclass));
    }

    fn parse_field(&mut self, indent: usize) {
        if self.classes.is_empty() {
            self.error(indent, "field".len(), "field declaration outside a class");
            return;
        }
        let body_start = indent + "field".len();
        let rest = &self.line[body_start..];
        let Some(colon_rel) = rest.find(':') else {
            self.error_at_end("expected `name: type` after `field`");
            return;
        };

        let (name_start, name_tok) = trim_with_offset(rest, 0, colon_rel, body_start);
        if !is_ident(name_tok) {
            self.error(
                name_start,
                name_tok.chars().count().max(1),
                format!("invalid field name `{name_tok}`"),
            );
            return;
        }

        let (ty_start, ty_tok) = trim_with_offset(rest, colon_rel + 1, rest.len(), body_start);
        if ty_tok.split_whitespace().count() > 1 {
            self.error(
                ty_start,
                ty_tok.chars().count(),
                "expected a single type after `:`",
            );
            return;
        }
        if PRIMITIVE_TYPES.contains(&ty_tok) {
            // primitive, nothing to link
        } else if ty_tok.contains('.') && is_class_name(ty_tok) {
            self.record_ref(ClassName::new(ty_tok), ty_start, ty_tok.chars().count());
        } else {
            self.error(
                ty_start,
                ty_tok.chars().count().max(1),
                format!("unknown type `{ty_tok}`"),
            );
            return;
        }

        let Some(class) = self.classes.last_mut() else {
            return;
        };
        if class.field(name_tok).is_some() {
            let class_name = class.name.clone();
            self.error(
                name_start,
                name_tok.chars().count(),
                format!("duplicate field `{name_tok}` in class `{class_name}`"),
            );
            return;
        }
        class.fields.push(FieldDecl {
            name: name_tok.to_string(),
            ty: ty_tok.to_string(),
        });
    }

    fn parse_method(&mut self, indent: usize) {
        if self.classes.is_empty() {
            self.error(indent, "method".len(), "method declaration outside a class");
            return;
        }
        let mut cursor = indent + "method".len();
        let Some((sig_start, sig_tok)) = next_token(self.line, cursor) else {
            self.error_at_end("expected `name()` after `method`");
            return;
        };
        cursor = sig_start + sig_tok.len();
        let Some(name_tok) = sig_tok.strip_suffix("()") else {
            self.error(
                sig_start,
                sig_tok.chars().count(),
                format!("expected `name()`, found `{sig_tok}` (methods take no parameters)"),
            );
            return;
        };
        if !is_ident(name_tok) {
            self.error(
                sig_start,
                name_tok.chars().count().max(1),
                format!("invalid method name `{name_tok}`"),
            );
            return;
        }

        let Some((eq_start, eq_tok)) = next_token(self.line, cursor) else {
            self.error_at_end("expected `=` and a body expression");
            return;
        };
        let expr_start = if eq_tok.starts_with('=') {
            eq_start + 1
        } else {
            self.error(
                eq_start,
                eq_tok.chars().count(),
                format!("expected `=`, found `{eq_tok}`"),
            );
            return;
        };

        let rest = &self.line[expr_start..];
        let ws = rest.len() - rest.trim_start().len();
        let expr_abs = expr_start + ws;
        let expr = rest.trim_start().trim_end();
        if expr.is_empty() {
            self.error_at_end("missing body expression");
            return;
        }
        let Some(body) = self.parse_expr(expr_abs, expr) else {
            return;
        };

        let Some(class) = self.classes.last_mut() else {
            return;
        };
        if class.method(name_tok).is_some() {
            let class_name = class.name.clone();
            self.error(
                sig_start,
                name_tok.chars().count(),
                format!("duplicate method `{name_tok}` in class `{class_name}`"),
            );
            return;
        }
        class.methods.push(MethodDecl {
            name: name_tok.to_string(),
            body,
        });
    }

    // -------------------------------------------------------------------------
    // Body expressions
    // -------------------------------------------------------------------------

    /// Parse a body expression starting at byte `start` of the line.
    ///
    /// `expr` is already trimmed on both ends.
    fn parse_expr(&mut self, start: usize, expr: &str) -> Option<MethodBody> {
        if expr.starts_with('"') {
            return self.parse_string(start, expr);
        }

        let tok = expr.split_whitespace().next().unwrap_or_default();
        if tok.len() != expr.len() {
            let after = &expr[tok.len()..];
            let lead = after.len() - after.trim_start().len();
            self.error(
                start + tok.len() + lead,
                after.trim().chars().count().max(1),
                "unexpected trailing characters after expression",
            );
            return None;
        }

        if let Some(call) = tok.strip_prefix("this.") {
            let Some(method) = call.strip_suffix("()") else {
                self.error(start, tok.chars().count(), EXPR_HELP);
                return None;
            };
            if !is_ident(method) {
                self.error(
                    start,
                    tok.chars().count(),
                    format!("invalid method name `{method}` in call"),
                );
                return None;
            }
            return Some(MethodBody::CallSelf {
                method: method.to_string(),
            });
        }

        let Some(target) = tok.strip_suffix("()") else {
            self.error(start, tok.chars().count(), EXPR_HELP);
            return None;
        };
        let Some((class_part, method)) = target.rsplit_once('.') else {
            self.error(start, tok.chars().count(), EXPR_HELP);
            return None;
        };
        if !is_class_name(class_part) || !is_ident(method) {
            self.error(start, tok.chars().count(), EXPR_HELP);
            return None;
        }
        let class = ClassName::new(class_part);
        self.record_ref(class.clone(), start, class_part.chars().count());
        Some(MethodBody::CallStatic {
            class,
            method: method.to_string(),
        })
    }

    fn parse_string(&mut self, start: usize, expr: &str) -> Option<MethodBody> {
        let mut literal = String::new();
        let mut escape_at = None;
        let mut close = None;
        for (i, ch) in expr.char_indices().skip(1) {
            if let Some(esc) = escape_at.take() {
                match ch {
                    '"' => literal.push('"'),
                    '\\' => literal.push('\\'),
                    'n' => literal.push('\n'),
                    other => {
                        self.error(start + esc, 2, format!("unknown escape `\\{other}`"));
                        return None;
                    }
                }
            } else if ch == '\\' {
                escape_at = Some(i);
            } else if ch == '"' {
                close = Some(i);
                break;
            } else {
                literal.push(ch);
            }
        }
        let Some(close) = close else {
            self.error(start, expr.chars().count(), "unterminated string literal");
            return None;
        };
        let rest = &expr[close + 1..];
        if !rest.trim().is_empty() {
            self.error(
                start + close + 1,
                rest.trim().chars().count(),
                "unexpected trailing characters after string literal",
            );
            return None;
        }
        Some(MethodBody::Literal(literal))
    }

    // -------------------------------------------------------------------------
    // Bookkeeping
    // -------------------------------------------------------------------------

    fn record_ref(&mut self, target: ClassName, start: usize, char_len: usize) {
        self.refs.push(ClassRef {
            target,
            file: self.unit.path.clone(),
            span: SourceSpan::new(self.line_no, col_at(self.line, start), char_len),
            line_text: self.line.to_string(),
        });
    }

    fn error(&mut self, start: usize, char_len: usize, message: impl Into<String>) {
        self.errors.push(Diagnostic::new(
            self.unit.path.clone(),
            SourceSpan::new(self.line_no, col_at(self.line, start), char_len),
            message,
            Some(self.line.to_string()),
        ));
    }

    fn error_at_end(&mut self, message: impl Into<String>) {
        self.errors.push(Diagnostic::new(
            self.unit.path.clone(),
            SourceSpan::new(self.line_no, self.line.chars().count() + 1, 1),
            message,
            Some(self.line.to_string()),
        ));
    }

    fn finish(mut self) -> Result<ParsedUnit, Vec<Diagnostic>> {
        if self.classes.is_empty() && self.errors.is_empty() {
            self.errors.push(Diagnostic::new(
                self.unit.path.clone(),
                SourceSpan::new(1, 1, 1),
                "unit declares no classes",
                self.unit.text.lines().next().map(str::to_string),
            ));
        }
        if self.errors.is_empty() {
            Ok(ParsedUnit {
                classes: self.classes,
                refs: self.refs,
            })
        } else {
            Err(self.errors)
        }
    }
}

const EXPR_HELP: &str = "expected string literal, `this.method()` or `Class.method()`";

// =============================================================================
// Lexical helpers
// =============================================================================

/// Next whitespace-delimited token at or after byte `from`.
fn next_token(line: &str, from: usize) -> Option<(usize, &str)> {
    if from >= line.len() {
        return None;
    }
    let rest = &line[from..];
    let skip = rest.len() - rest.trim_start().len();
    let start = from + skip;
    let token = line[start..].split_whitespace().next()?;
    Some((start, token))
}

/// Trim `rest[lo..hi]` and return (absolute byte offset, trimmed slice).
fn trim_with_offset<'a>(rest: &'a str, lo: usize, hi: usize, base: usize) -> (usize, &'a str) {
    let raw = &rest[lo..hi];
    let leading = raw.len() - raw.trim_start().len();
    (base + lo + leading, raw.trim())
}

/// 1-based character column of byte offset `off` in `line`.
fn col_at(line: &str, off: usize) -> usize {
    line[..off.min(line.len())].chars().count() + 1
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `pkg.sub.Class` or `pkg.Class$Nested`. Only the final segment may
/// carry `$` parts.
fn is_class_name(s: &str) -> bool {
    let segments: Vec<&str> = s.split('.').collect();
    let Some((last, init)) = segments.split_last() else {
        return false;
    };
    init.iter().all(|seg| is_ident(seg)) && last.split('$').all(is_ident) && !last.is_empty()
}

// =============================================================================
// Tests
// =============================================================================
