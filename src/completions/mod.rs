use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use clap_complete::Shell;

use crate::common::paths;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SupportedShell {
    Bash,
    Zsh,
    Fish,
}

impl SupportedShell {
    fn clap_shell(self) -> Shell {
        match self {
            SupportedShell::Bash => Shell::Bash,
            SupportedShell::Zsh => Shell::Zsh,
            SupportedShell::Fish => Shell::Fish,
        }
    }

    /// File name each shell's loader looks for
    pub fn file_name(self) -> &'static str {
        match self {
            SupportedShell::Bash => "stackctl.bash",
            SupportedShell::Zsh => "_stackctl",
            SupportedShell::Fish => "stackctl.fish",
        }
    }

    /// Install location when no `--output` is given
    pub fn default_target(self) -> PathBuf {
        paths::default_completions_dir().join(self.file_name())
    }
}

impl fmt::Display for SupportedShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.clap_shell(), f)
    }
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum CompletionCommands {
    /// Print the completion script to stdout
    Generate {
        #[arg(value_enum)]
        shell: SupportedShell,
    },
    /// Write the completion script to disk
    Install {
        #[arg(value_enum)]
        shell: SupportedShell,
        /// Target file (defaults to the stackctl data directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn generate(shell: SupportedShell) -> Result<String> {
    let mut command = crate::cli::command();
    let mut buffer = Vec::new();
    clap_complete::generate(shell.clap_shell(), &mut command, "stackctl", &mut buffer);
    String::from_utf8(buffer).context("rendering completions")
}

/// Write the script for `shell`, returning where it went
pub fn install(shell: SupportedShell, output: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let target = output.unwrap_or_else(|| shell.default_target());
    if target.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", target.display());
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating completions directory {}", parent.display()))?;
    }
    fs::write(&target, generate(shell)?)
        .with_context(|| format!("writing completion script to {}", target.display()))?;
    Ok(target)
}

/// How to make the shell pick up a script installed at `path`
pub fn instructions(shell: SupportedShell, path: &Path) -> String {
    match shell {
        SupportedShell::Bash => format!(
            "Add this to your ~/.bashrc:\n  [ -r \"{0}\" ] && source \"{0}\"",
            path.display()
        ),
        SupportedShell::Zsh => {
            let dir = path.parent().unwrap_or(path);
            format!(
                "Add this directory to your ~/.zshrc:\n  fpath=(\"{}\" $fpath)\nThen run: autoload -U compinit && compinit",
                dir.display()
            )
        }
        SupportedShell::Fish => format!(
            "Link it into fish's completion directory:\n  ln -s \"{}\" ~/.config/fish/completions/",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_mentions_subcommands() {
        let script = generate(SupportedShell::Bash).unwrap();
        assert!(script.contains("stackctl"));
        assert!(script.contains("install"));
        assert!(script.contains("cleanup"));
    }

    #[test]
    fn default_target_lives_in_the_data_directory() {
        let target = SupportedShell::Zsh.default_target();
        assert_eq!(target, paths::default_completions_dir().join("_stackctl"));
        assert_eq!(SupportedShell::Fish.to_string(), "fish");
    }

    #[test]
    fn install_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("_stackctl");
        assert_eq!(
            install(SupportedShell::Zsh, Some(target.clone()), false).unwrap(),
            target
        );
        assert!(install(SupportedShell::Zsh, Some(target.clone()), false).is_err());
        install(SupportedShell::Zsh, Some(target), true).unwrap();
    }

    #[test]
    fn zsh_instructions_point_at_the_directory() {
        let text = instructions(SupportedShell::Zsh, Path::new("/data/completions/_stackctl"));
        assert!(text.contains("fpath=(\"/data/completions\""));
    }
}
