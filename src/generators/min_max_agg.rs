//! MIN/MAX aggregate generator
//!
//! Expands `min_max_agg_tmpl.rs` into `min_max_agg.eg.rs`: one aggregate
//! struct per (MIN|MAX) x column type, each with a null-aware and a null-free
//! accumulation loop.

use std::path::Path;
use std::sync::Arc;

use crate::macros::{MacroPattern, MacroSet};
use crate::overload::{Operation, OverloadTable};
use crate::pipeline::TemplateGen;
use crate::substitute::TokenSubstitutions;

pub const OUTPUT_FILE: &str = "min_max_agg.eg.rs";
pub const TEMPLATE_FILE: &str = "min_max_agg_tmpl.rs";

/// Renders "any" for width-independent families
const TYPE_WIDTH_REPLACEMENT: &str = "{{#if width}}{{width}}{{else}}any{{/if}}";

/// Placeholder tokens, most specific first
pub fn tokens() -> TokenSubstitutions {
    TokenSubstitutions::new()
        .with("_AGG_TITLE", "{{agg_title agg}}")
        .with("_AGG", "{{agg_lower agg}}")
        .with("_CANONICAL_TYPE_FAMILY", "{{family}}")
        .with("_TYPE_WIDTH", TYPE_WIDTH_REPLACEMENT)
        .with("_RUSTTYPESLICE", "{{slice_type}}")
        .with("_RUSTTYPE", "{{rust_type}}")
        .with("_TYPE", "{{vec_method}}")
        .with("TemplateType", "{{vec_method}}")
}

pub fn macros() -> MacroSet {
    MacroSet::new()
        .with(MacroPattern::call("_ASSIGN_CMP", 3, "assign_cmp"))
        .with(MacroPattern::call("_UNSAFE_GET", 2, "unsafe_get"))
        .with(MacroPattern::call("_COPY_VAL", 2, "copy_val"))
        .with(MacroPattern::call("_SET", 3, "set_val"))
        .with(MacroPattern::nested(
            "_ACCUMULATE_MINMAX",
            4,
            "accumulate_min_max",
            4,
        ))
}

/// Operations in output order
pub fn operations() -> Vec<Operation> {
    vec![Operation::min(), Operation::max()]
}

pub fn generator(template_dir: &Path, table: Arc<OverloadTable>, header: bool) -> TemplateGen {
    TemplateGen {
        output: OUTPUT_FILE.to_string(),
        template_path: template_dir.join(TEMPLATE_FILE),
        tokens: tokens(),
        macros: macros(),
        operations: operations(),
        table,
        header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_order_has_no_shadowing() {
        assert!(tokens().shadowed_pairs().is_empty());
    }

    #[test]
    fn test_tokens_resolve_in_struct_names() {
        let out = tokens().apply("pub struct _AGG_TITLE_TYPEAgg { cur: _RUSTTYPE, col: &_RUSTTYPESLICE }");
        assert_eq!(
            out,
            "pub struct {{agg_title agg}}{{vec_method}}Agg { cur: {{rust_type}}, col: &{{slice_type}} }"
        );
    }

    #[test]
    fn test_family_and_width_tokens() {
        let out = tokens().apply("_CANONICAL_TYPE_FAMILY/_TYPE_WIDTH");
        assert_eq!(out, format!("{{{{family}}}}/{}", TYPE_WIDTH_REPLACEMENT));
    }

    #[test]
    fn test_generator_paths() {
        let gen = generator(
            Path::new("tmpl"),
            Arc::new(OverloadTable::same_type_comparisons()),
            true,
        );
        assert_eq!(gen.output, OUTPUT_FILE);
        assert_eq!(gen.template_path, Path::new("tmpl").join(TEMPLATE_FILE));
    }
}
