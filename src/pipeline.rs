//! Generation pipeline
//!
//! Wires the rewrite stages, the matrix builder and the compiler into one
//! generator:
//!
//! ```text
//! load → substitute tokens → rewrite macros → compile ┐
//!                            build overload matrix ───┴→ execute → sink
//! ```
//!
//! Each stage completes before the next starts. Any error aborts the whole
//! invocation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::compiler::TemplateCompiler;
use crate::error::{GenError, Result};
use crate::macros::MacroSet;
use crate::matrix::OverloadMatrix;
use crate::overload::{Operation, OverloadTable};
use crate::registry::Generator;
use crate::substitute::TokenSubstitutions;

/// First line of every generated file
pub const GENERATED_HEADER: &str = "// Code generated by execgen; DO NOT EDIT.\n";

/// Template text as read from disk
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub text: String,
}

impl TemplateSource {
    /// Read a template file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| GenError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded template {} ({} bytes)", path.display(), text.len());
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }
}

/// A template-driven generator
///
/// Declares everything one output file needs: where the template lives, how
/// its tokens and macros are rewritten, and which operations form the matrix.
#[derive(Clone)]
pub struct TemplateGen {
    pub output: String,
    pub template_path: PathBuf,
    pub tokens: TokenSubstitutions,
    pub macros: MacroSet,
    pub operations: Vec<Operation>,
    pub table: Arc<OverloadTable>,
    pub header: bool,
}

impl TemplateGen {
    /// Apply token substitution and macro rewriting
    pub fn rewrite(&self, source: &str) -> Result<String> {
        for (earlier, later) in self.tokens.shadowed_pairs() {
            warn!(
                "Token {} is substituted before {} and will corrupt it",
                earlier, later
            );
        }
        let substituted = self.tokens.apply(source);
        self.macros.rewrite(&substituted)
    }

    pub fn matrix(&self) -> OverloadMatrix {
        OverloadMatrix::build(&self.operations, &self.table)
    }

    /// Run the full pipeline, streaming the rendered file into `wr`
    pub fn run(&self, wr: &mut dyn Write) -> Result<()> {
        let source = TemplateSource::load(&self.template_path)?;
        let rewritten = self.rewrite(&source.text)?;
        let matrix = self.matrix();
        debug!(
            "Matrix for {}: {} group(s), {} section(s)",
            self.output,
            matrix.groups().len(),
            matrix.section_count()
        );

        let compiled = TemplateCompiler::new().compile(&self.output, &rewritten)?;
        if self.header {
            wr.write_all(GENERATED_HEADER.as_bytes())?;
        }
        compiled.execute(&matrix, wr)?;

        info!("Generated {}", self.output);
        Ok(())
    }
}

impl Generator for TemplateGen {
    fn output_file(&self) -> &str {
        &self.output
    }

    fn template_file(&self) -> &Path {
        &self.template_path
    }

    fn generate(&self, wr: &mut dyn Write) -> Result<()> {
        self.run(wr)
    }
}
