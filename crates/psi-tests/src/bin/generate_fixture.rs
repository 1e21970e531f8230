//! Writes synthetic `.psi` files for manual runs of the `psi` CLI.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_fixture -p psi-tests -- [OUT_DIR]
//! ```
//!
//! | File               | Contents                                   |
//! |--------------------|--------------------------------------------|
//! | plain_4.psi        | 4 zero points, no normals                  |
//! | plain_10k.psi      | 10 000 points, no normals, spot size       |
//! | normals_2.psi      | 2 points with normals                      |
//! | normals_100k.psi   | 100 000 points with normals                |
//! | truncated.psi      | `normals_2.psi` cut inside the record data |

#![allow(clippy::pedantic)]

use std::fs;
use std::path::PathBuf;

use psi_tests::SyntheticCloud;

fn main() {
    let out_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/fixtures"));
    fs::create_dir_all(&out_dir).expect("create output directory");

    let bounds = ([-24.1075, -28.9434, -16.8786], [-12.4364, -14.8525, -10.72375]);
    let normals_2 = SyntheticCloud::new(2).with_normals().bounds(bounds.0, bounds.1);

    let fixtures = [
        ("plain_4.psi", SyntheticCloud::new(4).records(vec![0; 32]).build()),
        (
            "plain_10k.psi",
            SyntheticCloud::new(10_000)
                .bounds(bounds.0, bounds.1)
                .spot_size(0.134_696)
                .build(),
        ),
        ("normals_2.psi", normals_2.build()),
        (
            "normals_100k.psi",
            SyntheticCloud::new(100_000).with_normals().bounds(bounds.0, bounds.1).build(),
        ),
        (
            "truncated.psi",
            normals_2.build()[..normals_2.data_offset() + 18].to_vec(),
        ),
    ];

    for (name, bytes) in fixtures {
        let path = out_dir.join(name);
        fs::write(&path, &bytes).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
        println!("{} ({} bytes)", path.display(), bytes.len());
    }
}
