//! Overload model and lookup table
//!
//! An [`Overload`] describes how values of one concrete column type are read,
//! copied, stored and compared for one comparison operator. Aggregations look
//! their overloads up by operator kind: MIN uses the `<` overloads, MAX the `>`
//! overloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};

/// Comparison operator kind keying the overload table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub const ALL: [CmpOp; 6] = [
        CmpOp::Eq,
        CmpOp::Ne,
        CmpOp::Lt,
        CmpOp::Le,
        CmpOp::Gt,
        CmpOp::Ge,
    ];

    /// Rust operator token
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// `std::cmp::Ordering` predicate with the same meaning
    fn ordering_predicate(self) -> &'static str {
        match self {
            CmpOp::Eq => "is_eq",
            CmpOp::Ne => "is_ne",
            CmpOp::Lt => "is_lt",
            CmpOp::Le => "is_le",
            CmpOp::Gt => "is_gt",
            CmpOp::Ge => "is_ge",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Canonical type family of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Bool,
    Bytes,
    Int,
    Float,
    Timestamp,
}

impl TypeFamily {
    /// Physical widths supported by the family; `None` means width-independent
    pub fn widths(self) -> &'static [Option<u32>] {
        match self {
            TypeFamily::Int => &[Some(16), Some(32), Some(64)],
            _ => &[None],
        }
    }
}

impl fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeFamily::Bool => "Bool",
            TypeFamily::Bytes => "Bytes",
            TypeFamily::Int => "Int",
            TypeFamily::Float => "Float",
            TypeFamily::Timestamp => "Timestamp",
        };
        f.write_str(name)
    }
}

/// A named aggregation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Canonical upper-case name, e.g. "MIN"
    pub name: String,
    /// Operator whose overloads implement the aggregation
    pub cmp: CmpOp,
}

impl Operation {
    pub fn new(name: impl Into<String>, cmp: CmpOp) -> Self {
        Self {
            name: name.into(),
            cmp,
        }
    }

    pub fn min() -> Self {
        Self::new("MIN", CmpOp::Lt)
    }

    pub fn max() -> Self {
        Self::new("MAX", CmpOp::Gt)
    }

    /// Lower-case display form, e.g. "min"
    pub fn lower_name(&self) -> String {
        Self::lower_of(&self.name)
    }

    /// Title-case display form, e.g. "Min"
    pub fn title_name(&self) -> String {
        Self::title_of(&self.name)
    }

    pub fn lower_of(name: &str) -> String {
        name.to_lowercase()
    }

    pub fn title_of(name: &str) -> String {
        let lower = name.to_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            None => String::new(),
            Some(c) => c.to_uppercase().chain(chars).collect(),
        }
    }
}

/// One (comparison operator, concrete type) specialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overload {
    pub cmp: CmpOp,
    pub family: TypeFamily,
    /// Storage width in bits; `None` for width-independent families
    pub width: Option<u32>,
    /// Element type, e.g. `i64`
    pub rust_type: String,
    /// Column slice type, e.g. `[i64]`
    pub slice_type: String,
    /// Column accessor suffix, e.g. `Int64`
    pub vec_method: String,
    /// `{target} = {left} OP {right};`
    pub assign_cmp: String,
    /// Read element `{idx}` of `{col}`
    pub unsafe_get: String,
    /// Copy `{src}` into `{dst}`
    pub copy_val: String,
    /// Store `{val}` at `{idx}` of `{col}`
    pub set: String,
}

impl Overload {
    /// Build the overload for `family` at `width`, deriving every name and
    /// code fragment
    pub fn new(cmp: CmpOp, family: TypeFamily, width: Option<u32>) -> Result<Self> {
        if !family.widths().contains(&width) {
            return Err(GenError::Table(format!(
                "{} does not support width {}",
                family,
                width.map_or_else(|| "any".to_string(), |w| w.to_string())
            )));
        }

        let (rust_type, vec_method) = match (family, width) {
            (TypeFamily::Bool, _) => ("bool".to_string(), "Bool".to_string()),
            (TypeFamily::Bytes, _) => ("Vec<u8>".to_string(), "Bytes".to_string()),
            (TypeFamily::Int, Some(w)) => (format!("i{}", w), format!("Int{}", w)),
            (TypeFamily::Int, None) => unreachable!("Int widths are validated above"),
            (TypeFamily::Float, _) => ("f64".to_string(), "Float64".to_string()),
            (TypeFamily::Timestamp, _) => ("i64".to_string(), "Timestamp".to_string()),
        };

        let fragments = Fragments::for_family(family, cmp, &rust_type);

        Ok(Self {
            cmp,
            family,
            width,
            slice_type: fragments.slice_type,
            rust_type,
            vec_method,
            assign_cmp: fragments.assign_cmp,
            unsafe_get: fragments.unsafe_get,
            copy_val: fragments.copy_val,
            set: fragments.set,
        })
    }
}

struct Fragments {
    slice_type: String,
    assign_cmp: String,
    unsafe_get: String,
    copy_val: String,
    set: String,
}

impl Fragments {
    fn for_family(family: TypeFamily, cmp: CmpOp, rust_type: &str) -> Self {
        match family {
            TypeFamily::Bytes => Self {
                slice_type: "Bytes".to_string(),
                assign_cmp: format!(
                    "{{target}} = AsRef::<[u8]>::as_ref(&{{left}}) {} AsRef::<[u8]>::as_ref(&{{right}});",
                    cmp.symbol()
                ),
                unsafe_get: "{col}.get({idx})".to_string(),
                copy_val: "{dst}.clear(); {dst}.extend_from_slice(&{src});".to_string(),
                set: "{col}.set({idx}, &{val});".to_string(),
            },
            TypeFamily::Float => Self {
                slice_type: format!("[{}]", rust_type),
                assign_cmp: format!(
                    "{{target}} = {{left}}.total_cmp(&{{right}}).{}();",
                    cmp.ordering_predicate()
                ),
                ..Self::copyable(rust_type)
            },
            TypeFamily::Bool | TypeFamily::Int | TypeFamily::Timestamp => Self {
                assign_cmp: format!("{{target}} = {{left}} {} {{right}};", cmp.symbol()),
                ..Self::copyable(rust_type)
            },
        }
    }

    fn copyable(rust_type: &str) -> Self {
        Self {
            slice_type: format!("[{}]", rust_type),
            assign_cmp: String::new(),
            unsafe_get: "{col}[{idx}]".to_string(),
            copy_val: "{dst} = {src};".to_string(),
            set: "{col}[{idx}] = {val};".to_string(),
        }
    }
}

/// YAML entry for one overload
#[derive(Debug, Clone, Deserialize)]
struct OverloadEntry {
    family: TypeFamily,
    #[serde(default)]
    width: Option<u32>,
}

/// Read-only lookup of overloads by comparison operator
///
/// Built once and shared; generation never mutates it.
#[derive(Debug, Clone, Default)]
pub struct OverloadTable {
    overloads: BTreeMap<CmpOp, Vec<Overload>>,
}

impl OverloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same-type comparison overloads for every operator and supported type
    pub fn same_type_comparisons() -> Self {
        const FAMILIES: [TypeFamily; 5] = [
            TypeFamily::Bool,
            TypeFamily::Bytes,
            TypeFamily::Int,
            TypeFamily::Float,
            TypeFamily::Timestamp,
        ];

        let mut table = Self::new();
        for cmp in CmpOp::ALL {
            for family in FAMILIES {
                for &width in family.widths() {
                    if let Ok(overload) = Overload::new(cmp, family, width) {
                        table.insert(overload);
                    }
                }
            }
        }
        table
    }

    /// Load a table from YAML
    ///
    /// ```yaml
    /// Lt:
    ///   - family: Int
    ///     width: 64
    ///   - family: Float
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let entries: BTreeMap<CmpOp, Vec<OverloadEntry>> =
            serde_yaml::from_str(yaml).map_err(|e| GenError::Table(e.to_string()))?;

        let mut table = Self::new();
        for (cmp, list) in entries {
            for entry in list {
                table.insert(Overload::new(cmp, entry.family, entry.width)?);
            }
        }
        Ok(table)
    }

    /// Append an overload after those already registered for its operator
    pub fn insert(&mut self, overload: Overload) {
        self.overloads.entry(overload.cmp).or_default().push(overload);
    }

    /// Overloads for `cmp` in insertion order; empty when none are registered
    pub fn get(&self, cmp: CmpOp) -> &[Overload] {
        self.overloads.get(&cmp).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.overloads.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
