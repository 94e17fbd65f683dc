use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "An AI assistant for your markdown notes", long_about = None)]
pub struct Args {
    /// Directory of markdown notes (overrides `vault` in the config)
    #[arg(short, long, global = true)]
    pub vault: Option<PathBuf>,

    /// Model to use for this run
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the assistant in an interactive session (the default)
    Chat,

    /// Ask a single question and print the answer; piped stdin is added as context
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Notes to use as context
        #[arg(short, long = "context", value_name = "NOTE")]
        context: Vec<String>,
    },

    /// Write into a note line by line; a line containing only `/ai` opens the assistant
    Write {
        /// Note to append to, relative to the vault or as a path
        note: PathBuf,
    },

    /// Watch a note for edits and open the assistant when `/ai` is typed in it
    Watch {
        /// Note to watch, relative to the vault or as a path
        note: PathBuf,
    },

    /// List notes in the vault, optionally filtered
    Notes {
        /// Case-insensitive filter on title or path
        query: Option<String>,
    },
}
