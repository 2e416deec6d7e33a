use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: CommonOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct CommonOptions {
    /// Type system schema file (JSON); only built-in types when omitted
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,

    /// CAS configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep content the type system cannot represent instead of failing
    #[arg(long, global = true)]
    pub lenient: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize XMI documents
    Inspect {
        /// XMI files, processed in parallel
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print one JSON object per document
        #[arg(long)]
        json: bool,
    },

    /// Read an XMI document and write it back with the same IDs
    Roundtrip {
        /// Input XMI file
        input: PathBuf,

        /// Output XMI file
        output: PathBuf,
    },

    /// List the types of the loaded type system
    Types {
        /// Include built-in types
        #[arg(long)]
        all: bool,
    },
}
