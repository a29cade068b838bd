// chatwin — Conversation message window engine for chat clients
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

pub mod error;
pub mod replay;
pub mod sdk;
pub mod window;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatwin", about = "Replay a conversation through the message window engine")]
pub struct Cli {
    /// Scenario file (JSON) to replay
    #[arg(long, short)]
    pub scenario: std::path::PathBuf,

    /// Window configuration file (defaults to <config dir>/chatwin/config.json)
    #[arg(long, short)]
    pub config: Option<std::path::PathBuf>,

    /// Override the page size from the configuration
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Write tracing diagnostics to a file (disabled unless explicitly set)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<std::path::PathBuf>,

    /// Tracing filter directives (example: `info,chatwin::window=debug`)
    /// Falls back to `RUST_LOG` when omitted.
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Append to `--log-file` instead of truncating on startup
    #[arg(long)]
    pub log_append: bool,

    /// Pretty-print the final report
    #[arg(long)]
    pub pretty: bool,
}
