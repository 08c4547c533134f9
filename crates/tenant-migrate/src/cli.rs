// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// tenant-migrate - Apply versioned migrations to every tenant
#[derive(Parser, Debug)]
#[command(name = "tenant-migrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply every pending migration to every tenant
    Run,

    /// Mark every migration as applied without running it (fresh installs only)
    Skip,

    /// Show each migration's ledger state
    Status(StatusArgs),
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
