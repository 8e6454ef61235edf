//! Template Compiler & Executor
//!
//! Compiles fully rewritten template text with Handlebars and renders it once
//! against the overload matrix. The registry is configured for source code, not
//! HTML: escaping is off and strict mode turns any missing field into an error.
//!
//! ## Helpers
//!
//! | helper | arguments | output |
//! |---|---|---|
//! | `agg_lower` | operation name | `min` |
//! | `agg_title` | operation name | `Min` |
//! | `build_dict` | `global=<any> has_nulls=<bool>` | [`NestedArgs`] object |
//! | `assign_cmp` | overload, target, left, right | comparison assignment |
//! | `unsafe_get` | overload, col, idx | element read |
//! | `copy_val` | overload, dst, src | value copy |
//! | `set_val` | overload, col, idx, val | element store |

use std::io::Write;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::overload::Operation;

/// Context handed to a nested partial by `build_dict`
///
/// Only two keys exist: `global`, the record that was current where the macro
/// was called, and `has_nulls`, the flag selecting the null-handling variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedArgs {
    pub global: Value,
    pub has_nulls: bool,
}

impl NestedArgs {
    pub const KEYS: [&'static str; 2] = ["global", "has_nulls"];

    pub fn builder() -> NestedArgsBuilder {
        NestedArgsBuilder::default()
    }
}

/// Builder for [`NestedArgs`] that rejects unknown keys
#[derive(Debug, Default)]
pub struct NestedArgsBuilder {
    global: Option<Value>,
    has_nulls: bool,
}

impl NestedArgsBuilder {
    pub fn global(mut self, value: Value) -> Self {
        self.global = Some(value);
        self
    }

    pub fn has_nulls(mut self, flag: bool) -> Self {
        self.has_nulls = flag;
        self
    }

    /// Set a key by name, as done from template hash arguments
    pub fn set(self, key: &str, value: &Value) -> std::result::Result<Self, String> {
        match key {
            "global" => Ok(self.global(value.clone())),
            "has_nulls" => match value.as_bool() {
                Some(flag) => Ok(self.has_nulls(flag)),
                None => Err(format!("has_nulls must be a boolean, got {}", value)),
            },
            other => Err(format!(
                "unknown key '{}', expected one of {:?}",
                other,
                NestedArgs::KEYS
            )),
        }
    }

    pub fn build(self) -> std::result::Result<NestedArgs, String> {
        let global = self
            .global
            .ok_or_else(|| "missing required key 'global'".to_string())?;
        Ok(NestedArgs {
            global,
            has_nulls: self.has_nulls,
        })
    }
}

/// `build_dict` helper: assembles [`NestedArgs`] from hash arguments
struct BuildDictHelper;

impl HelperDef for BuildDictHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'rc>, RenderError> {
        if !h.params().is_empty() {
            return Err(RenderErrorReason::Other(
                "build_dict takes hash arguments only".to_string(),
            )
            .into());
        }

        let mut builder = NestedArgs::builder();
        for (key, value) in h.hash() {
            builder = builder
                .set(key, value.value())
                .map_err(|e| RenderErrorReason::Other(format!("build_dict: {}", e)))?;
        }
        let args = builder
            .build()
            .map_err(|e| RenderErrorReason::Other(format!("build_dict: {}", e)))?;

        let json = serde_json::to_value(args)
            .map_err(|e| RenderErrorReason::Other(format!("build_dict: {}", e)))?;
        Ok(ScopedJson::Derived(json))
    }
}

fn str_param<'a>(
    h: &'a Helper,
    helper: &'static str,
    index: usize,
) -> std::result::Result<&'a str, RenderError> {
    let param = h
        .param(index)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex(helper, index))?;
    param.value().as_str().ok_or_else(|| {
        RenderErrorReason::Other(format!(
            "{}: parameter {} must be a string, got {}",
            helper,
            index,
            param.value()
        ))
        .into()
    })
}

fn agg_lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let name = str_param(h, "agg_lower", 0)?;
    out.write(&Operation::lower_of(name))?;
    Ok(())
}

fn agg_title_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let name = str_param(h, "agg_title", 0)?;
    out.write(&Operation::title_of(name))?;
    Ok(())
}

/// Fill the overload's `field` fragment, replacing `{slot}` with the helper's
/// string arguments in order
fn write_fragment(
    h: &Helper,
    helper: &'static str,
    field: &str,
    slots: &[&str],
    out: &mut dyn Output,
) -> HelperResult {
    let record = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex(helper, 0))?
        .value();
    let fragment = record.get(field).and_then(Value::as_str).ok_or_else(|| {
        RenderErrorReason::Other(format!(
            "{}: current record has no '{}' fragment",
            helper, field
        ))
    })?;

    let mut code = fragment.to_string();
    for (i, slot) in slots.iter().enumerate() {
        let arg = str_param(h, helper, i + 1)?;
        code = code.replace(&format!("{{{}}}", slot), arg);
    }
    if h.param(slots.len() + 1).is_some() {
        return Err(RenderErrorReason::Other(format!(
            "{}: expected {} arguments after the record",
            helper,
            slots.len()
        ))
        .into());
    }

    out.write(&code)?;
    Ok(())
}

fn assign_cmp_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_fragment(h, "assign_cmp", "assign_cmp", &["target", "left", "right"], out)
}

fn unsafe_get_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_fragment(h, "unsafe_get", "unsafe_get", &["col", "idx"], out)
}

fn copy_val_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_fragment(h, "copy_val", "copy_val", &["dst", "src"], out)
}

fn set_val_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_fragment(h, "set_val", "set", &["col", "idx", "val"], out)
}

/// Handlebars registry preconfigured with the generator helpers
pub struct TemplateCompiler {
    registry: Handlebars<'static>,
}

impl Default for TemplateCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCompiler {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);

        registry.register_helper("agg_lower", Box::new(agg_lower_helper));
        registry.register_helper("agg_title", Box::new(agg_title_helper));
        registry.register_helper("build_dict", Box::new(BuildDictHelper));
        registry.register_helper("assign_cmp", Box::new(assign_cmp_helper));
        registry.register_helper("unsafe_get", Box::new(unsafe_get_helper));
        registry.register_helper("copy_val", Box::new(copy_val_helper));
        registry.register_helper("set_val", Box::new(set_val_helper));

        Self { registry }
    }

    /// Register a named sub-template usable as `{{> name}}`
    pub fn with_partial(mut self, name: &str, text: &str) -> Result<Self> {
        self.registry.register_partial(name, text)?;
        Ok(self)
    }

    /// Compile rewritten template text
    ///
    /// Syntax errors surface as [`crate::GenError::Compile`].
    pub fn compile(mut self, name: &str, text: &str) -> Result<CompiledTemplate> {
        self.registry.register_template_string(name, text)?;
        debug!("Compiled template {} ({} bytes)", name, text.len());
        Ok(CompiledTemplate {
            registry: self.registry,
            name: name.to_string(),
        })
    }
}

/// A compiled template ready to render
pub struct CompiledTemplate {
    registry: Handlebars<'static>,
    name: String,
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render once against `data`, streaming into `wr`
    ///
    /// On error the writer may already hold part of the output; callers must
    /// discard it.
    pub fn execute<T: Serialize>(&self, data: &T, wr: &mut dyn Write) -> Result<()> {
        self.registry.render_to_write(&self.name, data, wr)?;
        Ok(())
    }

    /// Render once into a string
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        Ok(self.registry.render(&self.name, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenError;
    use serde_json::json;

    fn render(text: &str, data: &Value) -> Result<String> {
        TemplateCompiler::new().compile("t", text)?.render(data)
    }

    #[test]
    fn test_case_helpers() {
        let out = render(
            "{{#each this}}{{agg_lower agg}}/{{agg_title agg}} {{/each}}",
            &json!([{"agg": "MIN"}, {"agg": "MAX"}]),
        )
        .unwrap();
        assert_eq!(out, "min/Min max/Max ");
    }

    #[test]
    fn test_no_html_escaping() {
        let out = render("{{rust_type}}", &json!({"rust_type": "Vec<u8>"})).unwrap();
        assert_eq!(out, "Vec<u8>");
    }

    #[test]
    fn test_fragment_helper_fills_slots() {
        let data = json!({"assign_cmp": "{target} = {left} < {right};"});
        let out = render(r#"{{assign_cmp this "cmp" "a" "self.cur"}}"#, &data).unwrap();
        assert_eq!(out, "cmp = a < self.cur;");
    }

    #[test]
    fn test_fragment_helper_rejects_extra_argument() {
        let data = json!({"copy_val": "{dst} = {src};"});
        let err = render(r#"{{copy_val this "a" "b" "c"}}"#, &data).unwrap_err();
        assert!(matches!(err, GenError::Render(_)));
    }

    #[test]
    fn test_build_dict_feeds_partial() {
        let text = concat!(
            r#"{{#*inline "body"}}{{#if has_nulls}}nulls:{{else}}plain:{{/if}}{{global.name}}{{/inline}}"#,
            r#"{{#each this}}{{#with (build_dict global=this has_nulls=flag)}}{{> body}}{{/with}};{{/each}}"#,
        );
        let data = json!([{"name": "a", "flag": true}, {"name": "b", "flag": false}]);
        assert_eq!(render(text, &data).unwrap(), "nulls:a;plain:b;");
    }

    #[test]
    fn test_build_dict_rejects_unknown_key() {
        let err = render(
            "{{#with (build_dict global=this extra=1)}}x{{/with}}",
            &json!({}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown key"));
    }

    #[test]
    fn test_build_dict_rejects_non_bool_flag() {
        let err = render(
            r#"{{#with (build_dict global=this has_nulls="yes")}}x{{/with}}"#,
            &json!({}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("has_nulls must be a boolean"));
    }

    #[test]
    fn test_missing_field_is_execution_error() {
        let err = render("{{no_such_field}}", &json!({})).unwrap_err();
        assert!(matches!(err, GenError::Render(_)));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let err = TemplateCompiler::new()
            .compile("broken", "{{#each this}}unclosed")
            .err()
            .unwrap();
        assert!(matches!(err, GenError::Compile(_)));
    }

    #[test]
    fn test_registered_partial() {
        let compiled = TemplateCompiler::new()
            .with_partial("greet", "hello {{name}}")
            .unwrap()
            .compile("t", "{{> greet}}!")
            .unwrap();
        assert_eq!(compiled.render(&json!({"name": "x"})).unwrap(), "hello x!");
    }

    #[test]
    fn test_nested_args_builder() {
        let args = NestedArgs::builder()
            .set("global", &json!({"a": 1}))
            .unwrap()
            .set("has_nulls", &json!(true))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            args,
            NestedArgs {
                global: json!({"a": 1}),
                has_nulls: true
            }
        );
        assert!(NestedArgs::builder().build().is_err());
    }
}
