//! CLI arguments of app
use std::path::PathBuf;

use clap::Parser;

use crate::error::HostError;

/// CLI arguments struct
#[derive(Parser, Debug)]
#[command(about = "Run a legacy filter plug-in over an image")]
pub struct Args {
    /// Path to input image
    #[arg(long, value_name = "FILE", required_unless_present = "about")]
    pub input: Option<PathBuf>,

    /// Path to save result
    #[arg(long, value_name = "FILE", required_unless_present = "about")]
    pub output: Option<PathBuf>,

    /// Plugin file, or library name looked up in the plugin directory
    #[arg(long, value_name = "PLUGIN")]
    pub plugin: PathBuf,

    /// Path to plugins directory
    #[arg(long, default_value = "target/debug", value_name = "DIR")]
    pub plugin_path: PathBuf,

    /// Exported entry point; repeat to probe several for --about
    #[arg(long = "entry-point", value_name = "NAME", default_value = "PluginMain")]
    pub entry_points: Vec<String>,

    /// Saved parameters, read for --repeat and written after a run
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Replay the saved parameters without showing the filter's dialog
    #[arg(long, requires = "params")]
    pub repeat: bool,

    /// Show the about box of each entry point and exit
    #[arg(long)]
    pub about: bool,

    /// Grayscale selection mask, same size as the input
    #[arg(long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Host settings as JSON
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log selector calls and pump activity
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Verify all required files and directories exist
    /// return HostError if something does not exist
    pub fn check_basic_paths_exists(&self) -> Result<(), HostError> {
        for path in self.input.iter().chain(&self.mask) {
            if !path.exists() {
                return Err(HostError::InputFileNotFound(path.to_string_lossy().to_string()));
            }
        }

        if let Some(config) = &self.config {
            if !config.exists() {
                return Err(HostError::ConfigNotFound(config.to_string_lossy().to_string()));
            }
        }

        if self.repeat {
            if let Some(params) = &self.params {
                if !params.exists() {
                    return Err(HostError::ParamsFileNotFound(params.to_string_lossy().to_string()));
                }
            }
        }

        Ok(())
    }

    /// Resolve the plugin to an existing file and return `PathBuf` to it or `HostError` otherwise
    pub fn plugin_file(&self) -> Result<PathBuf, HostError> {
        if self.plugin.is_file() {
            return Ok(self.plugin.clone());
        }

        if !self.plugin_path.exists() {
            return Err(HostError::PluginDirectoryNotFound(
                self.plugin_path.to_string_lossy().to_string(),
            ));
        }

        let plugin_filename = libloading::library_filename(&self.plugin);
        let plugin_file = self.plugin_path.join(plugin_filename);

        if !plugin_file.exists() {
            return Err(HostError::PluginNotFound(plugin_file.to_string_lossy().to_string()));
        }

        Ok(plugin_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_defaults_and_repeats() {
        let args = Args::parse_from(["filter_host", "--about", "--plugin", "x"]);
        assert_eq!(args.entry_points, vec!["PluginMain".to_string()]);

        let args = Args::parse_from([
            "filter_host",
            "--about",
            "--plugin",
            "x",
            "--entry-point",
            "ENTRYPOINT1",
            "--entry-point",
            "ENTRYPOINT2",
        ]);
        assert_eq!(args.entry_points, vec!["ENTRYPOINT1", "ENTRYPOINT2"]);
    }

    #[test]
    fn test_input_required_unless_about() {
        assert!(Args::try_parse_from(["filter_host", "--plugin", "x"]).is_err());
        assert!(Args::try_parse_from(["filter_host", "--plugin", "x", "--input", "a", "--output", "b"]).is_ok());
    }

    #[test]
    fn test_repeat_requires_params() {
        let parsed = Args::try_parse_from([
            "filter_host", "--plugin", "x", "--input", "a", "--output", "b", "--repeat",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_input_is_reported() {
        let args = Args::parse_from([
            "filter_host", "--plugin", "x", "--input", "/nonexistent/in.png", "--output", "b",
        ]);
        assert!(matches!(
            args.check_basic_paths_exists(),
            Err(HostError::InputFileNotFound(_))
        ));
    }

    #[test]
    fn test_plugin_lookup_in_missing_directory() {
        let args = Args::parse_from([
            "filter_host",
            "--about",
            "--plugin",
            "nothing_here",
            "--plugin-path",
            "/nonexistent/dir",
        ]);
        assert!(matches!(
            args.plugin_file(),
            Err(HostError::PluginDirectoryNotFound(_))
        ));
    }
}
