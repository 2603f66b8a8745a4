//! Command-line arguments.

use std::path::PathBuf;

use webpilot_core::{BackendKind, Error, PilotConfig, Result};

/// Usage text printed for `--help`.
pub const USAGE: &str = "\
Usage: webpilot [OPTIONS]

Options:
  --config <path>      YAML configuration file
  --headless           Run the browser without a window
  --browser <kind>     chrome, firefox, edge or safari
  --webdriver <url>    WebDriver server URL (default http://localhost:9515)
  -h, --help           Print this help
  -V, --version        Print version";

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Configuration file
    pub config: Option<PathBuf>,
    /// Force headless mode
    pub headless: bool,
    /// Browser override
    pub browser: Option<BackendKind>,
    /// WebDriver URL override
    pub webdriver: Option<String>,
    /// Print usage and exit
    pub help: bool,
    /// Print version and exit
    pub version: bool,
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => parsed.config = Some(PathBuf::from(value(&arg, args.next())?)),
                "--headless" => parsed.headless = true,
                "--browser" => parsed.browser = Some(value(&arg, args.next())?.parse()?),
                "--webdriver" => parsed.webdriver = Some(value(&arg, args.next())?),
                "-h" | "--help" => parsed.help = true,
                "-V" | "--version" => parsed.version = true,
                other => {
                    return Err(Error::Config(format!(
                        "unexpected argument '{other}', see --help"
                    )))
                }
            }
        }

        Ok(parsed)
    }

    /// Load the configuration file, if any, and apply overrides.
    pub fn load_config(&self) -> Result<PilotConfig> {
        let mut config = match &self.config {
            Some(path) => PilotConfig::from_file(path)?,
            None => PilotConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Flags override file values.
    pub fn apply(&self, config: &mut PilotConfig) {
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(browser) = self.browser {
            config.browser.backend = browser;
        }
        if let Some(url) = &self.webdriver {
            config.browser.webdriver_url = url.clone();
        }
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String> {
    next.filter(|v| !v.starts_with("--"))
        .ok_or_else(|| Error::Config(format!("{flag} needs a value")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse([
            "--headless",
            "--browser",
            "firefox",
            "--webdriver",
            "http://127.0.0.1:4444",
        ])
        .unwrap();

        assert!(args.headless);
        assert_eq!(args.browser, Some(BackendKind::Firefox));
        assert_eq!(args.webdriver.as_deref(), Some("http://127.0.0.1:4444"));
    }

    #[test]
    fn test_missing_value_and_unknown_flag() {
        assert!(CliArgs::parse(["--config"]).is_err());
        assert!(CliArgs::parse(["--browser", "--headless"]).is_err());
        assert!(CliArgs::parse(["--browser", "netscape"]).is_err());
        assert!(CliArgs::parse(["--fast"]).is_err());
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let args = CliArgs::parse(["--headless", "--browser", "edge"]).unwrap();
        let config = args.load_config().unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.backend, BackendKind::Edge);

        let bad = CliArgs::parse(["--webdriver", "ftp://driver"]).unwrap();
        assert!(bad.load_config().is_err());
    }
}
