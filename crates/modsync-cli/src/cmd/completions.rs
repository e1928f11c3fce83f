use clap::CommandFactory;

use crate::Cli;

pub fn completions(shell: clap_complete::Shell) {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "modsync", &mut std::io::stdout());
}
