// {{!--
// Template for min_max_agg.eg.rs. It is expanded by execgen and is never
// compiled directly.
//
// Placeholder tokens (_AGG, _RUSTTYPE, TemplateType, ...) are substituted first,
// then macro calls are rewritten. The Handlebars directives kept in line
// comments drive the expansion over the overload matrix.

use super::template_types::{TemplateType, _RUSTTYPE, _RUSTTYPESLICE};
// --}}

use super::column::{Bytes, Nulls};

// {{#*inline "accumulate_min_max"}}
// {{#if has_nulls}}
                    if nulls.is_null(i) {
                        continue;
                    }
// {{/if}}
// {{#with global}}
                    let candidate = _UNSAFE_GET(col, i);
                    if !self.found_non_null {
                        _COPY_VAL(self.cur_agg, candidate)
                        self.found_non_null = true;
                    } else {
                        let cmp: bool;
                        _ASSIGN_CMP(cmp, candidate, self.cur_agg)
                        if cmp {
                            _COPY_VAL(self.cur_agg, candidate)
                        }
                    }
// {{/with}}
// {{/inline}}

// {{#each this}}
// {{#each overloads}}

/// _AGG_TITLE over _CANONICAL_TYPE_FAMILY columns, width _TYPE_WIDTH.
#[derive(Debug, Default)]
pub struct _AGG_TITLE_TYPEAgg {
    cur_agg: _RUSTTYPE,
    found_non_null: bool,
}

impl _AGG_TITLE_TYPEAgg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one batch into the running _AGG.
    pub fn compute(&mut self, col: &_RUSTTYPESLICE, nulls: Option<&Nulls>) {
        match nulls {
            Some(nulls) => {
                for i in 0..col.len() {
                    _ACCUMULATE_MINMAX(self, col, i, true)
                }
            }
            None => {
                for i in 0..col.len() {
                    _ACCUMULATE_MINMAX(self, col, i, false)
                }
            }
        }
    }

    /// Stores the _AGG at `idx` of `out`, or marks it null when every input
    /// was null, then resets for the next group.
    pub fn flush(&mut self, out: &mut _RUSTTYPESLICE, out_nulls: &mut Nulls, idx: usize) {
        if self.found_non_null {
            _SET(out, idx, self.cur_agg)
        } else {
            out_nulls.set_null(idx);
        }
        self.found_non_null = false;
    }
}
// {{/each}}
// {{/each}}
