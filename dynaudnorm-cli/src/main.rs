// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    ExitCode::from(dynaudnorm_cli::run_from_args(std::env::args_os()))
}
