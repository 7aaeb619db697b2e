//! Compile command - build one contract file

use crate::build::{CompilationResult, CompileRequest, Language};
use crate::cli::args::{CompileArgs, OutputFormat};
use crate::config::Config;
use crate::error::{ForgeError, ForgeResult};
use crate::fsutil;
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::{Path, PathBuf};

/// Stderr lines echoed for a failed build in table mode
const STDERR_TAIL_LINES: usize = 20;

/// Execute the compile command
pub async fn execute(args: CompileArgs, config: &Config) -> ForgeResult<()> {
    let language = match args.language {
        Some(language) => language,
        None => Language::from_path(&args.file).ok_or_else(|| {
            ForgeError::User(format!(
                "Cannot infer the language of {}; pass --language rust|javascript|typescript",
                args.file.display()
            ))
        })?,
    };

    let source = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| ForgeError::io(format!("reading {}", args.file.display()), e))?;

    let mut request = CompileRequest::new(source, language);
    if let Some(id) = args.project_id {
        request = request.with_project_id(id);
    }

    let ctx = UiContext::detect().with_quiet(args.format != OutputFormat::Table);
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Compiling {} contract {}", language, args.file.display()));

    let engine = super::engine(config);
    let result = engine.compile(&request).await;

    let output = args.output.unwrap_or_else(|| default_output(&args.file));
    if let Some(ref artifact) = result.artifact {
        fsutil::write_atomic(&output, artifact).await?;
        spinner.stop(&format!(
            "Compiled in {:.2}s{}",
            result.compile_duration_secs,
            if result.cached { " (cached)" } else { "" }
        ));
    } else {
        spinner.stop_error("Compilation failed");
    }

    match args.format {
        OutputFormat::Table => print_table(&result, &output),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Plain => {
            if result.success {
                println!("{}", output.display());
            }
        }
    }

    if result.success {
        Ok(())
    } else {
        Err(ForgeError::User(format!(
            "Compilation failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        )))
    }
}

/// `<stem>.wasm` in the current directory
fn default_output(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "contract".to_string());
    PathBuf::from(format!("{}.wasm", stem))
}

fn print_table(result: &CompilationResult, output: &Path) {
    if !result.success {
        let lines: Vec<&str> = result.stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        for line in &lines[start..] {
            ui::remark(line);
        }
        return;
    }

    ui::key_value("artifact", &output.display().to_string());
    ui::key_value("size", &fsutil::format_bytes(result.artifact_size));
    ui::key_value("language", &result.language.to_string());
    ui::key_value("cached", if result.cached { "yes" } else { "no" });
    ui::key_value("optimized", if result.optimized { "yes" } else { "no" });
    if let Some(ref key) = result.cache_key {
        ui::key_value("cache key", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_uses_stem() {
        assert_eq!(default_output(Path::new("contracts/hello.ts")), PathBuf::from("hello.wasm"));
        assert_eq!(default_output(Path::new("lib.rs")), PathBuf::from("lib.wasm"));
    }
}
