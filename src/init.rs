use crate::cli::InitArgs;
use repo_context::error::MirrorError;
use repo_context::ignore::IGNORE_FILE;
use std::fs;
use std::path::PathBuf;

const DEFAULT_IGNORE: &str = r#"# Generated files
*.min.js
*.min.css
*.d.ts
*.generated.*
*.pb.go

# Build output not covered by the built-in list
.vuepress/dist/
storybook-static/
site/

# Changelogs and history
CHANGELOG.md
HISTORY.md
NEWS.md

# Fixtures and snapshots
__snapshots__/
*.snap
testdata/
"#;

pub fn run(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = if args.global {
        let home = dirs::home_dir().ok_or_else(|| {
            MirrorError::Configuration("could not determine home directory".to_string())
        })?;
        home.join(IGNORE_FILE)
    } else {
        PathBuf::from(IGNORE_FILE)
    };

    if path.exists() && !args.force {
        return Err(MirrorError::Validation(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        ))
        .into());
    }

    fs::write(&path, DEFAULT_IGNORE).map_err(|e| MirrorError::fs("write", &path, e))?;

    let location = if args.global { "global" } else { "local" };
    println!("Created {} {} at {}", location, IGNORE_FILE, path.display());

    Ok(())
}
