//! Template scaffolding
//!
//! Renders a blueprint template into a scratch directory with the
//! infrastructure CLI, then reads the result back as a list of files ready to
//! be committed.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use idp_core::dto::repository::RepoFile;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Renders project templates into a directory
#[async_trait]
pub trait TemplateScaffolder: Send + Sync {
    async fn scaffold(
        &self,
        dir: &Path,
        template: &str,
        project_name: &str,
        description: &str,
    ) -> Result<()>;
}

/// Runs `<cli> new <template> --dir <dir> ...`
pub struct CliScaffolder {
    program: String,
}

impl CliScaffolder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TemplateScaffolder for CliScaffolder {
    async fn scaffold(
        &self,
        dir: &Path,
        template: &str,
        project_name: &str,
        description: &str,
    ) -> Result<()> {
        let project_name = if project_name.is_empty() {
            "pulumi-project"
        } else {
            project_name
        };

        debug!(template, dir = %dir.display(), "Rendering template");

        let output = Command::new(&self.program)
            .arg("new")
            .arg(template)
            .arg("--dir")
            .arg(dir)
            .args(["--name", project_name])
            .args(["--description", description])
            .args(["--yes", "--force", "-g"])
            .output()
            .await
            .with_context(|| format!("Failed to execute '{} new'", self.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "'{} new {}' exited with {}: {}",
                self.program,
                template,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!(template, "Template rendered");
        Ok(())
    }
}

/// Collects every regular file under `dir` with `/`-separated relative paths
pub fn collect_files(dir: &Path) -> Result<Vec<RepoFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .with_context(|| format!("{} is outside {}", entry.path().display(), dir.display()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read file {}", path))?;

        files.push(RepoFile::new(path, content));
    }

    Ok(files)
}
