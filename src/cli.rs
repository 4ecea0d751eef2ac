use crate::config::settings::ShellConfig;
use crate::config::types::{self, PROMPT};
use crate::core::bridge;
use crate::exec::executor::{Evaluator, Flow};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tsh", author, version, about = "A tiny shell with job control", long_about = None)]
struct Cli {
    /// Do not emit a command prompt
    #[arg(short = 'p')]
    no_prompt: bool,
    /// Print additional diagnostic information
    #[arg(short = 'v')]
    verbose: bool,
    /// Load settings from a JSON file (flags still apply on top)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn shell_config(&self) -> types::Result<ShellConfig> {
        let base = match &self.config {
            Some(path) => ShellConfig::load_from_file(path)?,
            None => ShellConfig::default(),
        };
        Ok(base.with_flags(self.no_prompt, self.verbose))
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_module("tsh", log::LevelFilter::Debug);
    }
    // A logger installed by an embedding process wins.
    let _ = builder.try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.shell_config()?;

    if config.merge_stderr {
        nix::unistd::dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO)
            .context("Failed to merge stderr into stdout")?;
    }

    init_logging(config.verbose);
    log::debug!("Starting tsh with {:?}", config);

    bridge::set_verbose(config.verbose);
    bridge::install().context("Failed to install signal handlers")?;

    let evaluator = Evaluator::new(config);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    read_eval_loop(&evaluator, &mut stdin.lock(), &mut stdout)?;

    log::debug!("Shell exiting");
    Ok(())
}

/// Prompt, read, evaluate until `quit` or end of input.
///
/// User errors are printed and the loop goes on; fatal errors end it.
pub fn read_eval_loop<R: BufRead, W: Write>(
    evaluator: &Evaluator,
    input: &mut R,
    out: &mut W,
) -> types::Result<()> {
    let mut line = String::new();

    loop {
        if evaluator.config().emit_prompt {
            write!(out, "{}", PROMPT)?;
            out.flush()?;
        }

        line.clear();
        if input.read_line(&mut line)? == 0 {
            out.flush()?;
            return Ok(());
        }

        match evaluator.eval(&line, out) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => return Ok(()),
            Err(err) if !err.is_fatal() => {
                writeln!(out, "{}", err)?;
                out.flush()?;
            }
            Err(err) => {
                log::error!("Fatal: {}", err);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_lines(config: ShellConfig, input: &str) -> String {
        let evaluator = Evaluator::new(config);
        let mut out = Vec::new();
        read_eval_loop(&evaluator, &mut Cursor::new(input.as_bytes()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_prompt_and_eof() {
        assert_eq!(run_lines(ShellConfig::default(), ""), "tsh> ");
        assert_eq!(run_lines(ShellConfig::default(), "\n  \n"), "tsh> tsh> tsh> ");
    }

    #[test]
    fn test_user_errors_keep_loop_running() {
        let config = ShellConfig::default().with_flags(true, false);
        let output = run_lines(config, "fg\nbg %x\ncat <\n");
        assert_eq!(
            output,
            "fg command requires PID or %jobid argument\n\
             bg: argument must be a PID or %jobid\n\
             Invalid command: syntax error: `<' needs a file name\n"
        );
    }

    #[test]
    fn test_quit_stops_reading() {
        let output = run_lines(ShellConfig::default(), "quit\nfg\n");
        assert_eq!(output, "tsh> ");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["tsh", "-p", "-v"]).unwrap();
        let config = cli.shell_config().unwrap();
        assert!(!config.emit_prompt);
        assert!(config.verbose);

        let cli = Cli::try_parse_from(["tsh"]).unwrap();
        assert_eq!(cli.shell_config().unwrap(), ShellConfig::default());

        assert!(Cli::try_parse_from(["tsh", "-x"]).is_err());
    }

    #[test]
    fn test_cli_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsh.json");
        std::fs::write(&path, r#"{"merge_stderr": true}"#).unwrap();

        let cli = Cli::try_parse_from(["tsh", "-p", "--config", path.to_str().unwrap()]).unwrap();
        let config = cli.shell_config().unwrap();
        assert!(config.merge_stderr);
        assert!(!config.emit_prompt);

        let cli = Cli::try_parse_from(["tsh", "--config", "/nonexistent/tsh.json"]).unwrap();
        assert!(cli.shell_config().is_err());
    }
}
