//! protoc plugin front-end.
//!
//! protoc hands a `CodeGeneratorRequest` on stdin and expects a
//! `CodeGeneratorResponse` on stdout, so stdout stays clean and all
//! diagnostics go to stderr.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use prost::Message;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut request_bytes = Vec::new();
    std::io::stdin()
        .read_to_end(&mut request_bytes)
        .context("read code generator request from stdin")?;

    let response = proprdb_gen::plugin::respond(&request_bytes)
        .context("process code generator request")?;

    let mut stdout = std::io::stdout();
    stdout
        .write_all(&response.encode_to_vec())
        .context("write code generator response to stdout")?;
    stdout.flush().context("flush code generator response")?;
    Ok(())
}
