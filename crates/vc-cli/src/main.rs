// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use vc_cli::{Cli, Parser};

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    std::mem::take(&mut cli.logging).init("vcb")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli.run(&mut out)
}
