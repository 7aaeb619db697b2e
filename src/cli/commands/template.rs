//! Template command - bootstrap or verify the managed workspace template

use crate::cli::args::{TemplateAction, TemplateArgs};
use crate::config::Config;
use crate::error::{ForgeError, ForgeResult};
use crate::toolchain::ToolchainKind;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the template command
pub async fn execute(args: TemplateArgs, config: &Config) -> ForgeResult<()> {
    let engine = super::engine(config);
    let template = engine.template();

    match args.action {
        TemplateAction::Init { force } => {
            engine.toolchain().probe(ToolchainKind::Managed).await?;

            if force {
                template.discard().await?;
            } else if template.is_ready() {
                ui::step_ok_detail("Workspace template already verified", &template.dir().display().to_string());
                return Ok(());
            }

            let ctx = UiContext::detect();
            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start(&format!(
                "Installing {}@{} (runs once)",
                template.settings().sdk_package,
                template.settings().sdk_version
            ));
            match template.ensure().await {
                Ok(()) => {
                    spinner.stop("Workspace template ready");
                    ui::remark(&template.dir().display().to_string());
                    Ok(())
                }
                Err(e) => {
                    spinner.stop_error("Workspace template bootstrap failed");
                    Err(e)
                }
            }
        }
        TemplateAction::Verify => {
            if !template.dir().exists() {
                ui::step_warn_hint("Workspace template not created", "Run: forge template init");
                return Err(ForgeError::PathNotFound(template.dir().to_path_buf()));
            }

            let missing = template.missing_paths();
            if missing.is_empty() {
                ui::step_ok_detail("Workspace template verified", &template.dir().display().to_string());
                return Ok(());
            }

            for path in &missing {
                ui::step_error_detail("Missing", path);
            }
            Err(ForgeError::TemplateIncomplete {
                path: template.dir().to_path_buf(),
                missing,
            })
        }
    }
}
