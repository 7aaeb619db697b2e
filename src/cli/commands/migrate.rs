//! Migrate command - rewrite legacy near-sdk syntax

use crate::cli::args::MigrateArgs;
use crate::error::{ForgeError, ForgeResult};
use crate::migrate::migrate;

/// Execute the migrate command
pub async fn execute(args: MigrateArgs) -> ForgeResult<()> {
    let source = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| ForgeError::io(format!("reading {}", args.file.display()), e))?;

    let migrated = migrate(&source);

    if args.check {
        if migrated != source {
            return Err(ForgeError::User(format!(
                "{} uses legacy near-sdk syntax",
                args.file.display()
            )));
        }
        println!("{} is up to date", args.file.display());
        return Ok(());
    }

    print!("{}", migrated);
    Ok(())
}
