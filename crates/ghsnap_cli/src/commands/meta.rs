use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;

use crate::Cli;

fn cli_command() -> clap::Command {
    Cli::command()
}

fn completion_script(shell: clap_complete::Shell) -> Vec<u8> {
    let mut cmd = cli_command();
    let mut out = Vec::new();
    clap_complete::generate(shell, &mut cmd, "ghsnap", &mut out);
    out
}

fn main_man_page() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let man = clap_mangen::Man::new(cli_command());
    let mut out = Vec::new();
    man.render(&mut out)?;
    Ok(out)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    std::io::stdout().write_all(&completion_script(shell))?;
    Ok(())
}

pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            clap_mangen::generate_to(cli_command(), &dir)?;
            println!("Generated man pages in: {}", dir.display());
        }
        None => {
            std::io::stdout().write_all(&main_man_page()?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli_command().debug_assert();
    }

    #[test]
    fn completion_script_mentions_subcommands() {
        let script = completion_script(clap_complete::Shell::Bash);
        let script = String::from_utf8(script).expect("completion output should be UTF-8");
        assert!(script.contains("ghsnap"));
        assert!(script.contains("activate"));
    }

    #[test]
    fn main_man_page_contains_expected_title() {
        let page = main_man_page().expect("man rendering should succeed");
        let page = String::from_utf8(page).expect("man output should be UTF-8");
        assert!(page.to_lowercase().contains(".th ghsnap"));
    }
}
