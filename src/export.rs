use std::io;
use std::error;
use std::fmt::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgConnection;
use tokio::io::AsyncWriteExt;

use crate::model::RobotsPart;
use crate::store;

#[derive(Parser)]
pub(crate) struct Opts {
    /// The file to write the associations to.
    /// If omitted, they will be written to stdout instead.
    file: Option<PathBuf>,
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    let rows = store::list::<RobotsPart>(db_conn)
        .await
        .context("failed to retrieve robot parts from database")?;

    match opts.file {
        Some(output_path) => {
            let file = tokio::fs::File::create(&output_path)
                .await
                .with_context(|| format!("failed to open output file {}", output_path.to_string_lossy()))?;

            let mut buf_writer = tokio::io::BufWriter::new(file);

            write_rows(&mut buf_writer, &rows)
                .await
                .with_context(|| format!("failed to write to output file {}", output_path.to_string_lossy()))
        },

        None => {
            let mut stdout = tokio::io::stdout();

            write_rows(&mut stdout, &rows)
                .await
                .context("failed to write to stdout")
        },
    }
}

/// Writes one `id robots_id parts_id` line per association.
async fn write_rows<W>(writer: &mut W, rows: &[RobotsPart]) -> Result<(), WriteError>
where
    W: AsyncWriteExt + Unpin,
{
    let mut format_buf = String::new();

    for row in rows {
        writeln!(&mut format_buf, "{} {} {}", row.id, row.robots_id, row.parts_id)?;
        writer.write_all(format_buf.as_bytes()).await?;
        format_buf.clear();
    }

    writer.flush().await?;

    Ok(())
}

#[derive(Debug)]
enum WriteError {
    FmtError(Box<fmt::Error>),
    IoError(Box<io::Error>),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FmtError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl error::Error for WriteError {}

impl From<fmt::Error> for WriteError {
    fn from(err: fmt::Error) -> Self {
        Self::FmtError(Box::new(err))
    }
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        Self::IoError(Box::new(err))
    }
}
