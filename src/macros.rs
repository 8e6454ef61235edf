//! Macro Call Rewriter
//!
//! Template sources contain pseudo-function calls such as
//! `_ASSIGN_CMP(cmp, candidate, self.cur_agg)`. Each call is recognized by a
//! fixed-arity regex and rewritten into Handlebars syntax before compilation.
//!
//! ## Rewrite strategies
//!
//! ```text
//! Call:    _ASSIGN_CMP(a, b, c)          → {{assign_cmp this "a" "b" "c"}}
//! Nested:  _ACCUMULATE_MINMAX(s, c, i, true)
//!          → {{#with (build_dict global=this has_nulls=true)}}{{> accumulate_min_max}}{{/with}}
//! ```
//!
//! Arguments are passed unevaluated; the helper or partial decides what to do
//! with them at render time, once per overload record. Each argument becomes a
//! JSON-escaped string literal, so backslash escapes and quotes in the source
//! text reach the generated file byte for byte.
//!
//! ## Argument limits
//!
//! - Only top-level commas split arguments. Commas inside `(...)`, `[...]` and
//!   `{...}` do not, so struct literals and nested calls are fine.
//! - Angle brackets are not grouped: `HashMap::<K, V>::new()` reads as two
//!   arguments. Bind such expressions to a local first.
//! - An argument must be plain source text. Placeholder tokens, other macro
//!   calls and `{{` are rejected with a located
//!   [`GenError::InvalidArgument`].
//! - The flag argument of a nested macro must be `true` or `false`.
//!
//! A call with the wrong number of arguments never matches its pattern. After all
//! passes the text is scanned for leftover calls, which are reported with their
//! position instead of leaking into the generated source.

use regex::{Captures, Match, Regex};
use serde_json::Value;
use tracing::debug;

use crate::error::{GenError, Result};

/// A parenthesized group nested at most two levels deep
const PAREN_GROUP: &str = r"\((?:[^()]|\([^()]*\))*\)";

/// A bracketed group, one level deep
const BRACKET_GROUP: &str = r"\[[^\[\]]*\]";

/// A braced group nested at most two levels deep
const BRACE_GROUP: &str = r"\{(?:[^{}]|\{[^{}]*\})*\}";

/// How a matched macro call is rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteStrategy {
    /// Invoke `helper` with the current record followed by every argument as a
    /// string literal
    Call { helper: String },

    /// Render the named partial with a `build_dict` context carrying the
    /// enclosing record as `global` and argument `flag_arg` (1-based) as
    /// `has_nulls`
    Nested { partial: String, flag_arg: usize },
}

/// One macro: name, fixed arity and rewrite strategy
#[derive(Debug, Clone)]
pub struct MacroPattern {
    name: String,
    arity: usize,
    strategy: RewriteStrategy,
    regex: Regex,
    call_start: Regex,
}

impl MacroPattern {
    /// # Panics
    ///
    /// When a nested strategy's `flag_arg` is not within `1..=arity`.
    pub fn new(name: impl Into<String>, arity: usize, strategy: RewriteStrategy) -> Self {
        let name = name.into();
        if let RewriteStrategy::Nested { flag_arg, .. } = &strategy {
            assert!(
                (1..=arity).contains(flag_arg),
                "{}: flag argument {} outside 1..={}",
                name,
                flag_arg,
                arity
            );
        }
        let regex = function_regex(&name, arity);
        let call_start = call_start_regex(&name);
        Self {
            name,
            arity,
            strategy,
            regex,
            call_start,
        }
    }

    /// Simple helper call rewrite
    pub fn call(name: impl Into<String>, arity: usize, helper: impl Into<String>) -> Self {
        Self::new(
            name,
            arity,
            RewriteStrategy::Call {
                helper: helper.into(),
            },
        )
    }

    /// Nested partial rewrite with a boolean flag argument
    ///
    /// # Panics
    ///
    /// When `flag_arg` is not within `1..=arity`.
    pub fn nested(
        name: impl Into<String>,
        arity: usize,
        partial: impl Into<String>,
        flag_arg: usize,
    ) -> Self {
        Self::new(
            name,
            arity,
            RewriteStrategy::Nested {
                partial: partial.into(),
                flag_arg,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn strategy(&self) -> &RewriteStrategy {
        &self.strategy
    }

    /// The compiled matcher, exposed for diagnostics and tests
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// One rewrite pass over the whole text
    ///
    /// Calls whose argument count differs from the declared arity are left
    /// untouched. Newlines inside a matched call are carried over after the
    /// replacement so line numbers stay aligned with the template file.
    pub fn rewrite_all(&self, text: &str) -> Result<String> {
        let mut failure = None;
        let rewritten = self.regex.replace_all(text, |caps: &Captures| {
            if failure.is_some() {
                return String::new();
            }
            match self.render_call(text, caps) {
                Ok(mut replacement) => {
                    let newlines = caps[0].matches('\n').count();
                    replacement.extend(std::iter::repeat('\n').take(newlines));
                    replacement
                }
                Err(e) => {
                    failure = Some(e);
                    String::new()
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(rewritten.into_owned()),
        }
    }

    fn render_call(&self, text: &str, caps: &Captures) -> Result<String> {
        let args: Vec<Match> = (1..=self.arity).filter_map(|i| caps.get(i)).collect();
        for (i, arg) in args.iter().enumerate() {
            if arg.as_str().contains("{{") {
                return Err(self.invalid_argument(
                    text,
                    arg,
                    i + 1,
                    "contains template syntax (a placeholder token or a rewritten macro call)",
                ));
            }
        }

        match &self.strategy {
            RewriteStrategy::Call { helper } => {
                let mut call = format!("{{{{{} this", helper);
                for arg in &args {
                    call.push(' ');
                    call.push_str(&string_literal(arg.as_str().trim()));
                }
                call.push_str("}}");
                Ok(call)
            }
            RewriteStrategy::Nested { partial, flag_arg } => {
                let flag = args.get(flag_arg - 1).ok_or_else(|| {
                    let start = caps.get(0).map_or(0, |m| m.start());
                    let (line, column) = line_col(text, start);
                    GenError::MalformedMacro {
                        name: self.name.clone(),
                        line,
                        column,
                        expected: self.arity,
                        found: args.len().to_string(),
                    }
                })?;
                match flag.as_str().trim() {
                    value @ ("true" | "false") => Ok(format!(
                        "{{{{#with (build_dict global=this has_nulls={})}}}}{{{{> {}}}}}{{{{/with}}}}",
                        value, partial
                    )),
                    _ => Err(self.invalid_argument(
                        text,
                        flag,
                        *flag_arg,
                        "must be `true` or `false`",
                    )),
                }
            }
        }
    }

    fn invalid_argument(&self, text: &str, arg: &Match, index: usize, reason: &str) -> GenError {
        let (line, column) = line_col(text, arg.start());
        GenError::InvalidArgument {
            name: self.name.clone(),
            index,
            line,
            column,
            reason: reason.to_string(),
        }
    }

    /// Locate calls to this macro that survived rewriting
    fn residual_calls(&self, text: &str) -> Vec<GenError> {
        self.call_start
            .find_iter(text)
            .map(|m| {
                let (line, column) = line_col(text, m.start());
                let found = match count_args(&text[m.end()..]) {
                    Some(n) if n == self.arity => {
                        format!("{} (arguments nested too deeply to rewrite)", n)
                    }
                    Some(n) => n.to_string(),
                    None => "unbalanced parentheses".to_string(),
                };
                GenError::MalformedMacro {
                    name: self.name.clone(),
                    line,
                    column,
                    expected: self.arity,
                    found,
                }
            })
            .collect()
    }
}

/// Ordered set of macro patterns applied as one rewrite stage
#[derive(Debug, Clone, Default)]
pub struct MacroSet {
    patterns: Vec<MacroPattern>,
}

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pattern: MacroPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn patterns(&self) -> &[MacroPattern] {
        &self.patterns
    }

    /// Rewrite every macro kind, one pass each, then reject leftovers
    ///
    /// A macro call inside another macro's argument is rejected before any
    /// pass runs. The first leftover call (in pattern order) is returned as
    /// [`GenError::MalformedMacro`].
    pub fn rewrite(&self, text: &str) -> Result<String> {
        self.reject_nested_calls(text)?;

        let mut result = text.to_string();
        for pattern in &self.patterns {
            let before = pattern.regex.find_iter(&result).count();
            result = pattern.rewrite_all(&result)?;
            debug!("Rewrote {} call(s) to {}", before, pattern.name);
        }

        for pattern in &self.patterns {
            if let Some(err) = pattern.residual_calls(&result).into_iter().next() {
                return Err(err);
            }
        }

        Ok(result)
    }

    fn reject_nested_calls(&self, text: &str) -> Result<()> {
        for outer in &self.patterns {
            for caps in outer.regex.captures_iter(text) {
                for (i, arg) in (1..=outer.arity).filter_map(|i| caps.get(i)).enumerate() {
                    let inner = self
                        .patterns
                        .iter()
                        .find(|p| p.call_start.is_match(arg.as_str()));
                    if let Some(inner) = inner {
                        return Err(outer.invalid_argument(
                            text,
                            &arg,
                            i + 1,
                            &format!("contains a call to {}", inner.name),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Build the matcher for `name(arg1, ..., argN)`
///
/// Each argument is non-empty and may contain nested parentheses, brackets or
/// braces; only top-level commas separate arguments.
fn function_regex(name: &str, arity: usize) -> Regex {
    let arg = format!(
        r"\s*((?:[^,()\[\]{{}}]|{}|{}|{})+?)\s*",
        PAREN_GROUP, BRACKET_GROUP, BRACE_GROUP
    );
    let args = if arity == 0 {
        r"\s*".to_string()
    } else {
        vec![arg; arity].join(",")
    };
    let pattern = format!(r"\b{}\({}\)", regex::escape(name), args);
    // The pattern is assembled from escaped input and fixed fragments
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid macro regex {}: {}", pattern, e))
}

fn call_start_regex(name: &str) -> Regex {
    let pattern = format!(r"\b{}\(", regex::escape(name));
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid macro regex {}: {}", pattern, e))
}

/// Double-quoted literal that Handlebars decodes back to exactly `arg`
fn string_literal(arg: &str) -> String {
    Value::from(arg).to_string()
}

/// Count top-level arguments up to the closing parenthesis
///
/// `rest` starts right after the opening parenthesis. Returns `None` when the
/// call is never closed.
fn count_args(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut non_blank = false;
    for c in rest.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            ')' => return Some(if non_blank { commas + 1 } else { 0 }),
            ',' if depth == 0 => commas += 1,
            _ => {}
        }
        if !c.is_whitespace() && c != ',' {
            non_blank = true;
        }
    }
    None
}

/// 1-based line and column of a byte offset
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign_cmp() -> MacroPattern {
        MacroPattern::call("_ASSIGN_CMP", 3, "assign_cmp")
    }

    #[test]
    fn test_simple_call_rewrite() {
        let out = assign_cmp()
            .rewrite_all("    _ASSIGN_CMP(cmp, candidate, self.cur_agg)\n")
            .unwrap();
        assert_eq!(
            out,
            "    {{assign_cmp this \"cmp\" \"candidate\" \"self.cur_agg\"}}\n"
        );
    }

    #[test]
    fn test_nested_argument_commas_do_not_split() {
        let out = assign_cmp()
            .rewrite_all("_ASSIGN_CMP(cmp, max(a, min(b, c)), col[i])")
            .unwrap();
        assert_eq!(
            out,
            "{{assign_cmp this \"cmp\" \"max(a, min(b, c))\" \"col[i]\"}}"
        );
    }

    #[test]
    fn test_extra_argument_left_untouched() {
        let text = "_ASSIGN_CMP(cmp, a, b, c)";
        let out = assign_cmp().rewrite_all(text).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn test_missing_argument_left_untouched() {
        let text = "_ASSIGN_CMP(cmp, a)";
        assert_eq!(assign_cmp().rewrite_all(text).unwrap(), text);
    }

    #[test]
    fn test_wrong_arity_is_diagnosed_with_position() {
        let set = MacroSet::new().with(assign_cmp());
        let text = "fn f() {\n    _ASSIGN_CMP(cmp, a, b)\n    _ASSIGN_CMP(cmp, a, b, c)\n}\n";

        let err = set.rewrite(text).unwrap_err();
        match err {
            GenError::MalformedMacro {
                name,
                line,
                column,
                expected,
                found,
            } => {
                assert_eq!(name, "_ASSIGN_CMP");
                assert_eq!(line, 3);
                assert_eq!(column, 5);
                assert_eq!(expected, 3);
                assert_eq!(found, "4");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unbalanced_call_is_diagnosed() {
        let set = MacroSet::new().with(assign_cmp());
        let err = set.rewrite("_ASSIGN_CMP(cmp, a, b").unwrap_err();
        assert!(err.to_string().contains("unbalanced parentheses"));
    }

    #[test]
    fn test_nested_rewrite_binds_flag() {
        let pattern = MacroPattern::nested("_ACCUMULATE_MINMAX", 4, "accumulate_min_max", 4);
        let out = pattern
            .rewrite_all("_ACCUMULATE_MINMAX(self, col, i, true)")
            .unwrap();
        assert_eq!(
            out,
            "{{#with (build_dict global=this has_nulls=true)}}{{> accumulate_min_max}}{{/with}}"
        );
    }

    #[test]
    fn test_multiline_call_keeps_line_count() {
        let text = "_ASSIGN_CMP(\n    cmp,\n    a,\n    b\n)\nnext";
        let out = assign_cmp().rewrite_all(text).unwrap();
        assert_eq!(out.matches('\n').count(), text.matches('\n').count());
        assert!(out.starts_with("{{assign_cmp this \"cmp\" \"a\" \"b\"}}"));
    }

    #[test]
    fn test_arguments_are_json_escaped() {
        let out = assign_cmp()
            .rewrite_all(r#"_ASSIGN_CMP(cmp, "it's\n", '\t')"#)
            .unwrap();
        assert_eq!(
            out,
            r#"{{assign_cmp this "cmp" "\"it's\\n\"" "'\\t'"}}"#
        );
    }

    #[test]
    fn test_brace_group_commas_do_not_split() {
        let pattern = MacroPattern::call("_COPY_VAL", 2, "copy_val");
        let out = pattern
            .rewrite_all("_COPY_VAL(x, Foo { a: 1, b: Bar { c: 2, d: 3 } })")
            .unwrap();
        assert_eq!(
            out,
            r#"{{copy_val this "x" "Foo { a: 1, b: Bar { c: 2, d: 3 } }"}}"#
        );
    }

    #[test]
    fn test_template_syntax_in_argument_is_rejected() {
        let text = "let a = 1;\n_ASSIGN_CMP(cmp, candidate as {{rust_type}}, b)";
        let err = assign_cmp().rewrite_all(text).unwrap_err();
        match err {
            GenError::InvalidArgument {
                name,
                index,
                line,
                column,
                ..
            } => {
                assert_eq!(name, "_ASSIGN_CMP");
                assert_eq!(index, 2);
                assert_eq!(line, 2);
                assert_eq!(column, 18);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_macro_call_in_argument_is_rejected() {
        // Inner pattern runs first and outer first; both orders are caught
        let get = MacroPattern::call("_UNSAFE_GET", 2, "unsafe_get");
        let copy = MacroPattern::call("_COPY_VAL", 2, "copy_val");
        let text = "_COPY_VAL(x, _UNSAFE_GET(col, i))";

        for set in [
            MacroSet::new().with(get.clone()).with(copy.clone()),
            MacroSet::new().with(copy.clone()).with(get.clone()),
        ] {
            let err = set.rewrite(text).unwrap_err();
            match err {
                GenError::InvalidArgument {
                    name,
                    index,
                    reason,
                    ..
                } => {
                    assert_eq!(name, "_COPY_VAL");
                    assert_eq!(index, 2);
                    assert!(reason.contains("_UNSAFE_GET"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_nested_flag_must_be_boolean() {
        let pattern = MacroPattern::nested("_ACC", 2, "acc", 2);
        let err = pattern.rewrite_all("_ACC(a, maybe)").unwrap_err();
        assert!(matches!(err, GenError::InvalidArgument { index: 2, .. }));
    }

    #[test]
    #[should_panic(expected = "flag argument 0 outside 1..=2")]
    fn test_nested_flag_index_out_of_range_panics() {
        MacroPattern::nested("_ACC", 2, "acc", 0);
    }

    #[test]
    #[should_panic(expected = "flag argument 3 outside 1..=2")]
    fn test_nested_strategy_validated_by_new() {
        MacroPattern::new(
            "_ACC",
            2,
            RewriteStrategy::Nested {
                partial: "acc".to_string(),
                flag_arg: 3,
            },
        );
    }

    #[test]
    fn test_longer_identifier_not_matched() {
        let text = "MY_ASSIGN_CMP(a, b, c)";
        assert_eq!(assign_cmp().rewrite_all(text).unwrap(), text);
        assert!(MacroSet::new().with(assign_cmp()).rewrite(text).is_ok());
    }

    #[test]
    fn test_zero_arity_call() {
        let pattern = MacroPattern::call("_RESET", 0, "reset");
        assert_eq!(pattern.rewrite_all("_RESET( )").unwrap(), "{{reset this}}");
    }
}
