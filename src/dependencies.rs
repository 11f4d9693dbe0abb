use crate::error::{GuardianError, Result};
use log::info;
use std::path::Path;
use tokio::process::Command;

/// Check that both media executables can be run
pub async fn validate_dependencies(ffmpeg: &Path, ffprobe: &Path) -> Result<()> {
    info!("Validating system dependencies...");

    check_tool("FFmpeg", ffmpeg).await?;
    check_tool("ffprobe", ffprobe).await?;

    info!("All dependencies validated successfully");
    Ok(())
}

/// Run `<program> -version` and log the first line
async fn check_tool(name: &str, program: &Path) -> Result<()> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .await
        .map_err(|_| GuardianError::MissingDependency {
            name: name.to_string(),
            suggestion: format!(
                "Could not run '{}'. Install FFmpeg (https://ffmpeg.org/download.html) or pass --{}-path",
                program.display(),
                name.to_lowercase()
            ),
        })?;

    if !output.status.success() {
        return Err(GuardianError::MissingDependency {
            name: name.to_string(),
            suggestion: format!("'{}' is installed but not working properly", program.display()),
        });
    }

    let version_info = String::from_utf8_lossy(&output.stdout);
    if let Some(version_line) = version_info.lines().next() {
        info!("{} found: {}", name, version_line);
    }

    Ok(())
}
