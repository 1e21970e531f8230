#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use psi_decoder::{DecodedRun, StreamDecoder};

#[derive(Debug, Arbitrary)]
struct Input {
    points: u8,
    normals: bool,
    min: [i16; 3],
    extent: [u16; 3],
    body: Vec<u8>,
    cuts: Vec<u16>,
}

fn build(input: &Input) -> Vec<u8> {
    let [x0, y0, z0] = input.min;
    let max = [
        i32::from(x0) + i32::from(input.extent[0]),
        i32::from(y0) + i32::from(input.extent[1]),
        i32::from(z0) + i32::from(input.extent[2]),
    ];
    let sep = if input.normals { "\r\n" } else { "\n" };
    let mut file = format!(
        "<Level=0>\r\n<NumPoints= {} {} >\r\n<Min= {x0} {y0} {z0} >\r\n<Max= {} {} {} >{sep}",
        input.points,
        u8::from(input.normals),
        max[0],
        max[1],
        max[2],
    )
    .into_bytes();
    file.extend_from_slice(&input.body);
    file.extend_from_slice(sep.as_bytes());
    file.extend_from_slice(b"</Level=0>\r\n");
    file
}

fn append(total: &mut DecodedRun, run: DecodedRun) {
    total.positions.extend(run.positions);
    total.colors.extend(run.colors);
    total.normals.extend(run.normals);
}

// Fuzz target: chunked StreamDecoder::advance against decode_whole.
//
// Catches bugs in:
// - Records decoded twice or skipped at snapshot boundaries
// - End-marker scans missing a marker split across snapshots
// - Short or overlong regions, and end markers inside the binary data
fuzz_target!(|input: Input| {
    let file = build(&input);

    let mut whole = StreamDecoder::new();
    let Ok(expected) = whole.decode_whole(&file) else {
        return;
    };

    let mut cuts: Vec<usize> = input
        .cuts
        .iter()
        .map(|&c| usize::from(c) % (file.len() + 1))
        .collect();
    cuts.sort_unstable();

    let mut stream = StreamDecoder::new();
    let mut actual = DecodedRun::default();
    for cut in cuts {
        let step = stream.advance(&file[..cut], false).expect("header parsed in one pass");
        append(&mut actual, step.run);
    }
    let step = stream.advance(&file, true).expect("header parsed in one pass");
    append(&mut actual, step.run);

    let bits = |v: &[f32]| v.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&actual.positions), bits(&expected.run.positions));
    assert_eq!(bits(&actual.colors), bits(&expected.run.colors));
    assert_eq!(bits(&actual.normals), bits(&expected.run.normals));
});
