//! Chunk-boundary independence.
//!
//! However the transport splits a file, the consumer must receive the
//! same values as when the whole file arrives at once.

use proptest::prelude::*;
use psi_decoder::{AttributeKind, DecoderConfig, StreamDecoder};
use psi_tests::{SyntheticCloud, decode_in_chunks, decode_one_shot, decode_with_cuts};

fn cloud() -> impl Strategy<Value = SyntheticCloud> {
    (0usize..120, any::<bool>(), 1u64..u64::MAX).prop_map(|(points, normals, seed)| {
        let cloud = SyntheticCloud::new(points)
            .bounds([-5.25, 0.0, 100.0], [5.25, 3.5, 180.0])
            .seed(seed);
        if normals { cloud.with_normals() } else { cloud }
    })
}

/// Clouds whose record and normal regions disagree with the announced
/// point count: short, overlong, or ending mid-record.
fn mismatched_cloud() -> impl Strategy<Value = SyntheticCloud> {
    (
        0usize..40,
        any::<bool>(),
        prop::collection::vec(any::<u8>(), 0..400),
        prop::collection::vec(any::<u8>(), 0..130),
    )
        .prop_map(|(points, normals, records, normal_bytes)| {
            let cloud = SyntheticCloud::new(points).records(records);
            if normals {
                cloud.with_normals().normal_bytes(normal_bytes)
            } else {
                cloud
            }
        })
}

/// Same batches, warnings and outcome as the one-shot path, whether or
/// not the session succeeds.
fn same_session(file: &[u8], cuts: &[usize]) -> Result<(), TestCaseError> {
    let config = DecoderConfig::default();
    let whole = decode_one_shot(file, config);
    let split = decode_with_cuts(file, cuts, config);

    for kind in AttributeKind::ALL {
        let a = whole.values(kind);
        let b = split.values(kind);
        prop_assert_eq!(a.len(), b.len(), "{} length", kind);
        prop_assert!(
            a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()),
            "{} values differ",
            kind
        );
    }
    prop_assert_eq!(&whole.warnings, &split.warnings);
    prop_assert_eq!(format!("{:?}", whole.outcome), format!("{:?}", split.outcome));
    prop_assert_eq!(whole.parsed_points, split.parsed_points);
    Ok(())
}

fn same_output(file: &[u8], cuts: &[usize], capacity: usize) -> Result<(), TestCaseError> {
    let config = DecoderConfig {
        batch_capacity: capacity,
    };
    let whole = decode_one_shot(file, config);
    let split = decode_with_cuts(file, cuts, config);

    prop_assert!(whole.is_complete());
    prop_assert!(split.is_complete());
    for kind in AttributeKind::ALL {
        let a = whole.values(kind);
        let b = split.values(kind);
        prop_assert_eq!(a.len(), b.len(), "{} length", kind);
        prop_assert!(
            a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()),
            "{} values differ",
            kind
        );
    }
    prop_assert_eq!(whole.parsed_points, split.parsed_points);
    Ok(())
}

proptest! {
    #[test]
    fn arbitrary_cuts_match_one_shot(
        cloud in cloud(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..24),
        capacity in (1usize..40).prop_map(|n| n * 3),
    ) {
        let file = cloud.build();
        let cuts: Vec<usize> = cuts.iter().map(|i| i.index(file.len() + 1)).collect();
        same_output(&file, &cuts, capacity)?;
    }

    #[test]
    fn mismatched_regions_match_one_shot(
        cloud in mismatched_cloud(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..24),
    ) {
        let file = cloud.build();
        let cuts: Vec<usize> = cuts.iter().map(|i| i.index(file.len() + 1)).collect();
        same_session(&file, &cuts)?;
    }

    #[test]
    fn byte_at_a_time_matches_one_shot(cloud in cloud()) {
        let file = cloud.build();
        let config = DecoderConfig::default();
        let whole = decode_one_shot(&file, config);
        let trickle = decode_in_chunks(&file, 1, config);
        for kind in AttributeKind::ALL {
            prop_assert_eq!(whole.values(kind), trickle.values(kind));
        }
        prop_assert_eq!(trickle.parsed_points, cloud.points());
    }

    #[test]
    fn batches_respect_capacity(cloud in cloud(), chunk in 1usize..300, capacity in (1usize..20).prop_map(|n| n * 3)) {
        let file = cloud.build();
        let out = decode_in_chunks(&file, chunk, DecoderConfig { batch_capacity: capacity });
        for kind in AttributeKind::ALL {
            let batches = out.batches_of(kind);
            if let Some((_, full)) = batches.split_last() {
                prop_assert!(full.iter().all(|b| b.values.len() == capacity));
            }
            prop_assert!(batches.iter().all(|b| !b.values.is_empty() && b.values.len() % 3 == 0 && b.values.len() <= capacity));
        }
        for progress in &out.progress {
            prop_assert!(progress.parsed_points <= progress.total_points);
        }
        prop_assert_eq!(out.parsed_points, cloud.points());
    }

    #[test]
    fn normals_are_unit_length(points in 1usize..64, seed in 1u64..u64::MAX) {
        let file = SyntheticCloud::new(points).with_normals().seed(seed).build();
        let normals = decode_one_shot(&file, DecoderConfig::default()).values(AttributeKind::Normal);
        prop_assert_eq!(normals.len(), points * 3);
        for n in normals.chunks_exact(3) {
            let len = n.iter().map(|&c| f64::from(c).powi(2)).sum::<f64>().sqrt();
            prop_assert!((len - 1.0).abs() < 1e-5, "{:?} has length {}", n, len);
        }
    }

    #[test]
    fn stream_decoder_never_panics_on_noise(bytes in prop::collection::vec(any::<u8>(), 0..512), step in 1usize..64) {
        let mut stream = StreamDecoder::new();
        let mut len = 0;
        while len < bytes.len() {
            len = (len + step).min(bytes.len());
            if stream.advance(&bytes[..len], false).is_err() {
                return Ok(());
            }
        }
        let _ = stream.advance(&bytes, true);
    }
}

#[test]
fn header_split_inside_every_tag() {
    let cloud = SyntheticCloud::new(9).with_normals().spot_size(0.25);
    let file = cloud.build();
    let whole = decode_one_shot(&file, DecoderConfig::default());
    for cut in 1..cloud.data_offset() + 4 {
        let split = decode_with_cuts(&file, &[cut], DecoderConfig::default());
        assert_eq!(
            whole.values(AttributeKind::Position),
            split.values(AttributeKind::Position),
            "cut at {cut}"
        );
        assert!(split.is_complete(), "cut at {cut}");
    }
}

#[test]
fn every_short_body_matches_one_shot_at_every_cut() {
    for normals in [false, true] {
        for body_len in 0..=40 {
            let cloud = SyntheticCloud::new(5).records(vec![0; body_len]);
            let cloud = if normals { cloud.with_normals().normal_bytes(Vec::new()) } else { cloud };
            let file = cloud.build();
            let whole = decode_one_shot(&file, DecoderConfig::default());
            for cut in cloud.data_offset()..file.len() {
                let split = decode_with_cuts(&file, &[cut], DecoderConfig::default());
                assert_eq!(
                    whole.values(AttributeKind::Position),
                    split.values(AttributeKind::Position),
                    "body {body_len}, normals {normals}, cut at {cut}"
                );
                assert_eq!(whole.warnings, split.warnings, "body {body_len}, cut at {cut}");
            }
        }
    }
}
