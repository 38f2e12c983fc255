//! Shell completion generation for autoexport
//!
//! This module provides functionality to generate shell completion scripts
//! for bash, zsh, and fish, with dynamic completion of configured form ids
//! for the `export` subcommand.

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

const BIN_NAME: &str = "autoexport";

/// Print the completion script for a shell
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish)
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion(shell_name: &str) -> Result<()> {
    print!("{}", completion_script(shell_name)?);
    Ok(())
}

/// Build the completion script for a shell
pub fn completion_script(shell_name: &str) -> Result<String> {
    let shell = parse_shell(shell_name)?;
    let basic = clap_script(shell);

    let script = match shell {
        Shell::Bash => format!(
            r#"{basic}
# Complete configured form ids after `export`
_autoexport_enhanced() {{
    local cur prev
    cur="${{COMP_WORDS[COMP_CWORD]}}"
    prev="${{COMP_WORDS[COMP_CWORD-1]}}"

    if [[ "$prev" == "export" ]]; then
        COMPREPLY=($(compgen -W "$({BIN_NAME} config --list-forms 2>/dev/null)" -- "$cur"))
        return 0
    fi

    _autoexport "$@"
}}

complete -F _autoexport_enhanced {BIN_NAME}
"#
        ),
        Shell::Zsh => format!(
            r#"{basic}
# Complete configured form ids after `export`
_autoexport_forms() {{
    local -a forms
    forms=($({BIN_NAME} config --list-forms 2>/dev/null))
    _describe 'forms' forms
}}

_autoexport_enhanced() {{
    if [[ ${{words[CURRENT-1]}} == "export" ]]; then
        _autoexport_forms
        return 0
    fi
    _autoexport "$@"
}}

compdef _autoexport_enhanced {BIN_NAME}
"#
        ),
        Shell::Fish => format!(
            r#"{basic}
# Complete configured form ids after `export`
complete -c {BIN_NAME} -n "__fish_seen_subcommand_from export" -f -a "({BIN_NAME} config --list-forms 2>/dev/null)" -d "Configured form"
"#
        ),
        _ => basic,
    };

    Ok(script)
}

fn clap_script(shell: Shell) -> String {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ConfigError::Generic(format!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish",
            shell_name
        ))
        .into()),
    }
}
