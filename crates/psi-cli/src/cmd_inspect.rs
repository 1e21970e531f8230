/// Implementation of `psi inspect`.
///
/// Reads a PSI file, decodes it in one pass and prints the header together
/// with where each region sits in the file.
///
/// # Output format
///
/// ```text
/// Header:      4 points, no normals, 8-byte records, min (0, 0, 0), max (10, 10, 10)
/// Center:      (5, 5, 5)
/// Spot size:   -
/// Binary data: offset 51
/// Records:     51..83 (32 bytes)
/// Normals:     none
/// Decoded:     4 of 4 points
/// ```
use std::fs;

use anyhow::{Context, Result};
use psi_decoder::{DecodeWarning, StreamDecoder};
use serde::Serialize;

use crate::InspectArgs;

#[derive(Serialize)]
struct Report {
    total_points: usize,
    has_normals: bool,
    record_stride: usize,
    min: [f64; 3],
    max: [f64; 3],
    center: [f64; 3],
    spot_size: Option<f64>,
    data_offset: usize,
    records: Span,
    normals: Option<Span>,
    decoded_points: usize,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn describe(&self) -> String {
        format!("{}..{} ({} bytes)", self.start, self.end, self.end - self.start)
    }
}

/// Run the `psi inspect` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its header is missing
/// or malformed.
pub fn run(args: &InspectArgs) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;

    let mut stream = StreamDecoder::new();
    let step = stream
        .decode_whole(&bytes)
        .with_context(|| format!("failed to decode {}", args.file.display()))?;
    let header = stream
        .header()
        .with_context(|| format!("{} has no header", args.file.display()))?;
    let cursor = stream.cursor();

    let report = Report {
        total_points: header.total_points,
        has_normals: header.has_normals,
        record_stride: header.layout.stride,
        min: header.bounds.min,
        max: header.bounds.max,
        center: header.bounds.center(),
        spot_size: header.spot_size,
        data_offset: cursor.data_start,
        records: Span {
            start: cursor.data_start,
            end: cursor.region_boundary,
        },
        normals: header.has_normals.then_some(Span {
            start: cursor.region_boundary,
            end: cursor.normals_end,
        }),
        decoded_points: step.run.positions.len() / 3,
        warnings: step.warnings.iter().map(DecodeWarning::to_string).collect(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("cannot serialise report")?;
        println!("{json}");
        return Ok(());
    }

    let [cx, cy, cz] = report.center;
    println!("Header:      {header}");
    println!("Center:      ({cx}, {cy}, {cz})");
    match report.spot_size {
        Some(size) => println!("Spot size:   {size}"),
        None => println!("Spot size:   -"),
    }
    println!("Binary data: offset {}", report.data_offset);
    println!("Records:     {}", report.records.describe());
    match &report.normals {
        Some(span) => println!("Normals:     {}", span.describe()),
        None => println!("Normals:     none"),
    }
    println!(
        "Decoded:     {} of {} points",
        report.decoded_points, report.total_points
    );
    for warning in &report.warnings {
        println!("Warning:     {warning}");
    }

    Ok(())
}
