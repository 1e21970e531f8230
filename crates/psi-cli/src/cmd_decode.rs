/// Implementation of `psi decode`.
///
/// Streams the file through [`Loader`] on a current-thread runtime, so the
/// decoder sees the file the same way it would see a network response:
/// as a buffer growing by `--chunk-size` bytes at a time. Batches are
/// collected per attribute and written as one point per line.
///
/// ```text
/// x y z r g b            (files without normals)
/// x y z r g b nx ny nz   (files with normals)
/// ```
use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result, bail};
use psi_decoder::{AttributeKind, Decoder, DecoderConfig, DecoderEvent, Loader, Outcome};

use crate::DecodeArgs;

/// Attribute arrays reassembled from batches.
#[derive(Default)]
struct Cloud {
    positions: Vec<f32>,
    colors: Vec<f32>,
    normals: Vec<f32>,
    batches: usize,
    warnings: usize,
}

impl Cloud {
    fn points(&self) -> usize {
        self.positions.len() / 3
    }

    /// Every attribute covers every announced point.
    fn check(&self, total_points: usize) -> Result<()> {
        if self.points() != total_points {
            bail!("decoded {} of {total_points} points", self.points());
        }
        if self.colors.len() != self.positions.len() {
            bail!("decoded {} colors for {total_points} points", self.colors.len() / 3);
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            bail!("decoded {} normals for {total_points} points", self.normals.len() / 3);
        }
        Ok(())
    }

    fn write_points(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut normals = self.normals.chunks_exact(3);
        for (p, c) in self.positions.chunks_exact(3).zip(self.colors.chunks_exact(3)) {
            write!(out, "{} {} {} {} {} {}", p[0], p[1], p[2], c[0], c[1], c[2])?;
            if let Some(n) = normals.next() {
                write!(out, " {} {} {}", n[0], n[1], n[2])?;
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

/// Run the `psi decode` command.
///
/// # Errors
///
/// Returns an error if the flags are invalid, the file cannot be read,
/// the stream is malformed or short, or the output cannot be written.
pub fn run(args: &DecodeArgs) -> Result<()> {
    let config = DecoderConfig {
        batch_capacity: args.batch_capacity,
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;

    let mut cloud = Cloud::default();
    let mut failure = None;

    let total_points = runtime.block_on(async {
        let decoder = Decoder::with_config(config, |event| match event {
            DecoderEvent::Batch(batch) => {
                cloud.batches += 1;
                let target = match batch.kind {
                    AttributeKind::Position => &mut cloud.positions,
                    AttributeKind::Color => &mut cloud.colors,
                    AttributeKind::Normal => &mut cloud.normals,
                };
                target.extend_from_slice(&batch.values);
            }
            DecoderEvent::Warning(_) => cloud.warnings += 1,
            DecoderEvent::End(Outcome::Failed(err)) => failure = Some(err),
            DecoderEvent::Start | DecoderEvent::Progress(_) | DecoderEvent::End(_) => {}
        })
        .context("invalid decoder configuration")?;

        let loader = Loader::open(&args.file, decoder)
            .await
            .with_context(|| format!("cannot read {}", args.file.display()))?
            .chunk_size(args.chunk_size)
            .context("invalid chunk size")?;

        let decoder = loader.run().await;
        Ok::<_, anyhow::Error>(decoder.total_points())
    })?;

    if let Some(err) = failure {
        return Err(err).with_context(|| format!("failed to decode {}", args.file.display()));
    }
    cloud
        .check(total_points)
        .with_context(|| format!("incomplete decode of {}", args.file.display()))?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot write {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if args.summary {
        writeln!(
            out,
            "{} points, {} batches, {} warnings{}",
            cloud.points(),
            cloud.batches,
            cloud.warnings,
            if cloud.normals.is_empty() { "" } else { ", with normals" }
        )
        .context("cannot write summary")?;
        out.flush().context("cannot write summary")?;
    } else {
        cloud
            .write_points(out.as_mut())
            .context("cannot write points")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(points: usize, normals: usize) -> Cloud {
        Cloud {
            positions: vec![1.0; points * 3],
            colors: vec![0.5; points * 3],
            normals: vec![0.0; normals * 3],
            ..Cloud::default()
        }
    }

    #[test]
    fn short_normals_are_rejected() {
        let err = cloud(2, 1).check(2).unwrap_err();
        assert_eq!(err.to_string(), "decoded 1 normals for 2 points");
        assert!(cloud(2, 2).check(2).is_ok());
        assert!(cloud(2, 0).check(2).is_ok());
        assert!(cloud(1, 0).check(2).is_err());
    }

    #[test]
    fn writes_one_line_per_point() {
        let mut out = Vec::new();
        cloud(2, 2).write_points(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 1 1 0.5 0.5 0.5 0 0 0\n".repeat(2));
    }
}
