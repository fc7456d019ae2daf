use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scribeq",
    about = "Queue video files and YouTube links for AI transcription",
    version,
    long_about = "Queues local media files and YouTube links for transcription. File jobs are transcribed directly by the AI backend; YouTube jobs are served from the video's captions (premium search, community instances, then page scraping) and refined into punctuated prose. Completed transcripts land in a local library."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Transcription API key used when no configured key is active
    #[arg(long, env = "SCRIBEQ_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue inputs and transcribe them
    Transcribe {
        /// Video files or YouTube URLs to queue
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,

        /// Maximum jobs in flight at once (1-10; defaults to the configured
        /// or automatic limit)
        #[arg(short, long, value_name = "N")]
        concurrency: Option<usize>,

        /// Write completed transcripts to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Re-admit failed jobs once after the first pass
        #[arg(long)]
        retry_failed: bool,
    },

    /// Inspect and manage the transcript library
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Manage transcription API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Manage the premium caption-search API key
    CaptionsKey {
        #[command(subcommand)]
        action: CaptionsKeyAction,
    },
}

#[derive(Subcommand)]
pub enum LibraryAction {
    /// List stored transcripts
    List,

    /// Print one stored transcript
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Concatenate every stored transcript into one text blob
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Delete one stored transcript
    Remove {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Delete every stored transcript
    Clear,
}

#[derive(Subcommand)]
pub enum KeysAction {
    /// Add a named key and make it active
    Add {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// List configured keys (secrets masked)
    List,

    /// Make a key active
    Use {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Remove a key
    Remove {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CaptionsKeyAction {
    /// Set the caption-search key
    Set {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Remove the caption-search key
    Clear,

    /// Show the caption-search key (masked)
    Show,
}
