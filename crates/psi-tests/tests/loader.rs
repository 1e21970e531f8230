//! Async transport tests: the loader over in-memory readers and duplex
//! pipes, compared with direct decoder sessions.

use std::time::Duration;

use psi_decoder::{
    AttributeKind, Batch, DecodeError, Decoder, DecoderConfig, DecoderEvent, Loader, LoaderConfig,
    Outcome,
};
use psi_tests::{SyntheticCloud, decode_one_shot};
use tokio::io::AsyncWriteExt;

fn positions(events: &[DecoderEvent]) -> Vec<f32> {
    events
        .iter()
        .filter_map(|e| match e {
            DecoderEvent::Batch(Batch {
                kind: AttributeKind::Position,
                values,
            }) => Some(values.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

#[tokio::test]
async fn loader_matches_direct_session() {
    let file = SyntheticCloud::new(500).with_normals().seed(42).build();
    let reference = decode_one_shot(&file, DecoderConfig::default());

    for chunk_size in [1, 13, 4096, 1 << 20] {
        let mut events = Vec::new();
        let config = LoaderConfig {
            chunk_size,
            total_size: Some(file.len() as u64),
        };
        let decoder = Loader::with_config(file.as_slice(), Decoder::new(|e| events.push(e)), config)
            .unwrap()
            .run()
            .await;
        assert_eq!(decoder.parsed_points(), 500, "chunk size {chunk_size}");
        assert_eq!(decoder.byte_size(), Some(file.len() as u64));
        drop(decoder);

        assert_eq!(positions(&events), reference.values(AttributeKind::Position));
        assert!(matches!(events.first(), Some(DecoderEvent::Start)));
        assert!(matches!(events.last(), Some(DecoderEvent::End(Outcome::Complete))));
    }
}

#[tokio::test]
async fn decodes_while_writer_is_still_sending() {
    let file = SyntheticCloud::new(300).seed(5).build();
    let (mut tx, rx) = tokio::io::duplex(64);

    let payload = file.clone();
    let writer = tokio::spawn(async move {
        for piece in payload.chunks(97) {
            tx.write_all(piece).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    let mut events = Vec::new();
    let config = DecoderConfig { batch_capacity: 30 };
    let decoder = Loader::new(rx, Decoder::with_config(config, |e| events.push(e)).unwrap())
        .run()
        .await;
    writer.await.unwrap();

    assert_eq!(decoder.parsed_points(), 300);
    drop(decoder);
    let batches_before_end = events
        .iter()
        .take_while(|e| !matches!(e, DecoderEvent::End(_)))
        .filter(|e| matches!(e, DecoderEvent::Batch(_)))
        .count();
    assert_eq!(batches_before_end, 2 * 300 * 3 / 30);
}

#[tokio::test]
async fn stop_handle_halts_a_stalled_transfer() {
    let file = SyntheticCloud::new(50).build();
    let (mut tx, rx) = tokio::io::duplex(1024);
    tx.write_all(&file[..file.len() / 2]).await.unwrap();

    let loader = Loader::with_config(
        rx,
        Decoder::new(|_| {}),
        LoaderConfig {
            chunk_size: 16,
            total_size: None,
        },
    )
    .unwrap();
    let stop = loader.stop_handle();
    let task = tokio::spawn(loader.run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    stop.stop();
    // Wake the pending read so the loop observes the stop flag.
    tx.write_all(&file[file.len() / 2..file.len() / 2 + 1])
        .await
        .unwrap();

    let decoder = task.await.unwrap();
    assert!(!decoder.is_finished());
    assert!(decoder.parsed_points() < 50);
    drop(tx);
}

#[tokio::test]
async fn closed_pipe_mid_file_is_truncated() {
    let file = SyntheticCloud::new(40).with_normals().build();
    let (mut tx, rx) = tokio::io::duplex(4096);
    let cut = file.len() / 2;
    tx.write_all(&file[..cut]).await.unwrap();
    drop(tx);

    let mut events = Vec::new();
    Loader::new(rx, Decoder::new(|e| events.push(e))).run().await;
    assert!(matches!(
        events.last(),
        Some(DecoderEvent::End(Outcome::Failed(DecodeError::Truncated { expected: 40, .. })))
    ));
}
