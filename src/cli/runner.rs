use log::info;
use std::io::Write;

use crate::{
    cli::Args,
    config::EngineConfig,
    error::Result,
    loader::{load_data, render_file},
};

/// Renders one template file as described by the command line.
pub struct Runner {
    args: Args,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Loads configuration and data, renders the template and writes the result.
    pub fn run(self) -> Result<()> {
        let config = self.load_config()?;
        let engine = config.build_engine()?;
        let data = load_data(self.args.data.as_deref(), self.args.data_file.as_deref())?;

        let output = render_file(&engine, &self.args.template, &data)?;

        match &self.args.output {
            Some(path) => {
                std::fs::write(path, &output)?;
                info!("Rendered {} into {}", self.args.template.display(), path.display());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    fn load_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.args.config {
            Some(dir) => EngineConfig::load(dir)?,
            None => EngineConfig::default(),
        };
        config.strict |= self.args.strict;
        Ok(config)
    }
}

/// Entry point used by the binary.
pub fn run(args: Args) -> Result<()> {
    Runner::new(args).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn renders_into_output_file() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("page.html");
        let output = dir.path().join("out.html");
        fs::write(&template, "Hi [[= name ]]").unwrap();

        let args = Args::parse_from([
            "tinplate",
            template.to_str().unwrap(),
            "--data",
            r#"{"name": "Ann"}"#,
            "--output",
            output.to_str().unwrap(),
        ]);
        run(args).unwrap();
        assert_eq!(fs::read_to_string(output).unwrap(), "Hi Ann");
    }

    #[test]
    fn strict_flag_overrides_config() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("page.html");
        fs::write(&template, "[[= missing ]]").unwrap();
        fs::write(dir.path().join("tinplate.json"), r#"{"strict": false}"#).unwrap();

        let args = Args::parse_from([
            "tinplate",
            template.to_str().unwrap(),
            "--config",
            dir.path().to_str().unwrap(),
            "--strict",
        ]);
        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("Variable \"missing\" is not defined"));
    }
}
