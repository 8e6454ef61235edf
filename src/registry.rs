//! Generator registry
//!
//! Maps each generated file name to the generator that produces it and the
//! template it depends on. Files are rendered into memory first and written
//! only when generation succeeded, so a failed run never leaves a truncated
//! file behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ExecgenConfig;
use crate::error::{GenError, Result};
use crate::generators;
use crate::overload::OverloadTable;

/// A source generator for one output file
pub trait Generator: Send + Sync {
    /// File name of the generated output, e.g. `min_max_agg.eg.rs`
    fn output_file(&self) -> &str;

    /// Template the output is generated from; a change to it requires
    /// regeneration
    fn template_file(&self) -> &Path;

    /// Render the output into `wr`
    ///
    /// On error anything already written to `wr` is invalid.
    fn generate(&self, wr: &mut dyn Write) -> Result<()>;
}

/// Registry of generators in registration order
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in generator
    pub fn builtin(config: &ExecgenConfig, table: Arc<OverloadTable>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(generators::min_max_agg::generator(
            &config.template_dir,
            table,
            config.header,
        )));
        registry
    }

    pub fn register(&mut self, generator: Box<dyn Generator>) {
        debug!(
            "Registered generator {} <- {}",
            generator.output_file(),
            generator.template_file().display()
        );
        self.generators.push(generator);
    }

    pub fn get(&self, output: &str) -> Option<&dyn Generator> {
        self.generators
            .iter()
            .find(|g| g.output_file() == output)
            .map(|g| g.as_ref())
    }

    /// Registered output names, sorted
    pub fn outputs(&self) -> Vec<&str> {
        let mut outputs: Vec<&str> = self.generators.iter().map(|g| g.output_file()).collect();
        outputs.sort_unstable();
        outputs
    }

    /// `(output, template dependency)` pairs in registration order
    pub fn dependencies(&self) -> Vec<(&str, &Path)> {
        self.generators
            .iter()
            .map(|g| (g.output_file(), g.template_file()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Render one output into memory, optionally through `rustfmt`
    pub fn render(&self, output: &str, format: bool) -> Result<Vec<u8>> {
        let generator = self
            .get(output)
            .ok_or_else(|| GenError::UnknownOutput(output.to_string()))?;

        let mut buf = Vec::new();
        generator.generate(&mut buf)?;

        if format {
            buf = format_rust(buf)?;
        }
        Ok(buf)
    }

    /// Render one output and write it to `dir`
    pub fn generate_to_dir(&self, output: &str, dir: &Path, format: bool) -> Result<PathBuf> {
        let contents = self.render(output, format)?;
        let path = dir.join(output);
        std::fs::write(&path, contents)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Generate every registered output into `dir`, stopping at the first error
    pub fn generate_all(&self, dir: &Path, format: bool) -> Result<Vec<PathBuf>> {
        self.generators
            .iter()
            .map(|g| self.generate_to_dir(g.output_file(), dir, format))
            .collect()
    }
}

/// Pipe generated source through `rustfmt`
fn format_rust(source: Vec<u8>) -> Result<Vec<u8>> {
    let mut child = Command::new("rustfmt")
        .args(["--edition", "2021"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GenError::Format(format!("failed to start rustfmt: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| GenError::Format("rustfmt stdin unavailable".to_string()))?;
    let writer = std::thread::spawn(move || stdin.write_all(&source));

    let output = child.wait_with_output()?;
    writer
        .join()
        .map_err(|_| GenError::Format("rustfmt input thread panicked".to_string()))??;

    if !output.status.success() {
        return Err(GenError::Format(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}
