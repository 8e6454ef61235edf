//! Execgen - build-time generator for type-specialized aggregate kernels
//!
//! A single hand-written template source is expanded into one concrete Rust
//! source file covering every (operation x type x nullability) combination.
//!
//! ## Pipeline
//!
//! ```text
//! min_max_agg_tmpl.rs
//!     ↓
//! 1. Token substitution   _RUSTTYPE → {{rust_type}}
//! 2. Macro rewriting      _ASSIGN_CMP(cmp, a, b) → {{assign_cmp this "cmp" "a" "b"}}
//! 3. Overload matrix      [MIN × {Bool, Bytes, Int16, ...}, MAX × {...}]
//! 4. Compile + execute    Handlebars, rendered once against the matrix
//!     ↓
//! min_max_agg.eg.rs
//! ```
//!
//! Every stage is a pure text or data transformation, so the same template and
//! overload table always produce byte-identical output.

pub mod compiler;
pub mod config;
pub mod error;
pub mod generators;
pub mod macros;
pub mod matrix;
pub mod overload;
pub mod pipeline;
pub mod registry;
pub mod substitute;

pub use compiler::{CompiledTemplate, NestedArgs, TemplateCompiler};
pub use config::{ConfigLoader, ExecgenConfig};
pub use error::{GenError, Result};
pub use macros::{MacroPattern, MacroSet, RewriteStrategy};
pub use matrix::{OverloadGroup, OverloadMatrix};
pub use overload::{CmpOp, Operation, Overload, OverloadTable, TypeFamily};
pub use pipeline::{TemplateGen, TemplateSource, GENERATED_HEADER};
pub use registry::{Generator, GeneratorRegistry};
pub use substitute::TokenSubstitutions;
