#![allow(unused)]
pub use tracing::{debug, error, info, warn};

use std::{io::IsTerminal, str::FromStr};
use tracing::{Level, Metadata};
use tracing_subscriber::{fmt, prelude::*};

/// Crates of this workspace, logged down to the configured level
const WORKSPACE_TARGETS: [&str; 3] = ["netconn", "netconn_lib", "netconn_wire"];

/// Install the stdout logger, level taken from `RUST_LOG` (default `info`)
pub fn init_logger() {
  let level = std::env::var("RUST_LOG")
    .ok()
    .and_then(|v| Level::from_str(v.trim()).ok())
    .unwrap_or(Level::INFO);

  // console output is interleaved with the prompt, keep it short
  let stdio_layer = fmt::layer()
    .with_target(true)
    .with_level(true)
    .with_thread_names(true)
    .with_ansi(std::io::stdout().is_terminal())
    .compact()
    .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
      is_logged(metadata, level)
    }));

  tracing_subscriber::registry().with(stdio_layer).init();
}

/// Workspace crates log down to `level`, dependencies never below INFO
fn is_logged(metadata: &Metadata<'_>, level: Level) -> bool {
  let from_workspace = WORKSPACE_TARGETS.iter().any(|name| {
    metadata
      .target()
      .strip_prefix(name)
      .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
  });
  if from_workspace {
    metadata.level() <= &level
  } else {
    metadata.level() <= &Level::INFO.min(level)
  }
}
