//! CLI module - Command-line interface for Libris
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;
mod display;

use clap::{Parser, Subcommand};

use crate::domain::SortField;

/// Libris - Library catalog browser
/// Pages, searches and edits a remote book catalog
#[derive(Parser)]
#[command(name = "libris")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the catalog and print one page of results
    #[command(alias = "s")]
    Search {
        /// Keyword to search for
        query: Vec<String>,
        /// Page number, starting at 1
        #[arg(long, short, default_value = "1")]
        page: u32,
        /// Page size (one of the configured sizes)
        #[arg(long)]
        page_size: Option<u32>,
        /// Column to sort by (id, title, author)
        #[arg(long)]
        sort: Option<SortField>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Column filter as FIELD=VALUE, may be repeated
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,
    },

    /// Show details about a book
    #[command(alias = "i", alias = "info")]
    Show {
        /// Book ID
        id: String,
    },

    /// Delete a book from the catalog
    #[command(alias = "rm")]
    Delete {
        /// Book ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Page through the catalog interactively
    #[command(alias = "b")]
    Browse,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
