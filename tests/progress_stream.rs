use bytes::Bytes;
use futures::stream::{self, StreamExt};
use multipull::error::{DecodeError, EngineError, PullError};
use multipull::progress::{ImageProgress, ProgressEvent, decode_events};

fn body(chunks: &[&'static str]) -> impl futures::Stream<Item = Result<Bytes, EngineError>> + Unpin {
    stream::iter(
        chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect::<Vec<_>>(),
    )
}

async fn collect(chunks: &[&'static str]) -> Vec<Result<ProgressEvent, PullError>> {
    decode_events(body(chunks)).collect().await
}

/// Feed the events through a fresh aggregator, recording every visible change
async fn track(chunks: &[&'static str]) -> (ImageProgress, Vec<(String, u8)>) {
    let mut progress = ImageProgress::new("nginx:latest");
    let mut changes = Vec::new();
    for event in collect(chunks).await {
        let event = event.unwrap();
        if progress.apply(&event) {
            changes.push((progress.status().to_string(), progress.percent()));
        }
    }
    progress.finish();
    (progress, changes)
}

#[tokio::test]
async fn test_download_progress_is_rounded_and_finalized() {
    let (progress, changes) = track(&[
        r#"{"status":"Downloading","progressDetail":{"current":50,"total":200}}"#,
        r#"{"status":"Downloading","progressDetail":{"current":1,"total":3}}"#,
        r#"{"status":"Status: Downloaded newer image for nginx:latest"}"#,
    ])
    .await;

    assert_eq!(
        changes,
        vec![
            ("Downloading".to_string(), 25),
            ("Downloading".to_string(), 33),
            ("Downloaded newer image for nginx:latest".to_string(), 33),
        ]
    );
    assert_eq!(progress.percent(), 100);
    assert_eq!(progress.status(), "Downloaded newer image for nginx:latest");
}

#[tokio::test]
async fn test_events_without_totals_keep_percentage() {
    let (progress, changes) = track(&[
        r#"{"status":"Pulling from library/nginx","id":"latest"}"#,
        r#"{"status":"Pulling fs layer","id":"a2abf6c4d29d"}"#,
        r#"{"status":"Downloading","progressDetail":{"current":5,"total":10},"id":"a2abf6c4d29d"}"#,
        r#"{"status":"Verifying Checksum","progressDetail":{},"id":"a2abf6c4d29d"}"#,
    ])
    .await;

    assert_eq!(changes.last(), Some(&("Verifying Checksum".to_string(), 50)));
    assert!(progress.is_finished());
}

#[tokio::test]
async fn test_objects_split_at_every_byte() {
    const STREAM: &str = concat!(
        r#"{"status":"Downloading","progressDetail":{"current":7,"total":70}}"#,
        "\r\n",
        r#"{"status":"Extracting","progressDetail":{"current":70,"total":70}}"#,
    );
    let chunks: Vec<&'static str> = (0..STREAM.len()).map(|i| &STREAM[i..i + 1]).collect();

    let events: Vec<ProgressEvent> = collect(&chunks)
        .await
        .into_iter()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].current, Some(7.0));
    assert_eq!(events[1].status, "Extracting");
    assert_eq!(events[1].total, Some(70.0));
}

#[tokio::test]
async fn test_truncated_stream_reports_error_after_valid_events() {
    let events = collect(&[
        r#"{"status":"Downloading","progressDetail":{"current":1,"total":2}}"#,
        r#"{"status":"Down"#,
    ])
    .await;

    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert!(matches!(
        events[1],
        Err(PullError::Decode(DecodeError::Truncated(_)))
    ));
}

#[tokio::test]
async fn test_transport_error_ends_stream() {
    let chunks: Vec<Result<Bytes, EngineError>> = vec![
        Ok(Bytes::from_static(br#"{"status":"Waiting"}"#)),
        Err(EngineError::Status {
            status: 500,
            message: "connection reset".to_string(),
        }),
        Ok(Bytes::from_static(br#"{"status":"never decoded"}"#)),
    ];

    let events: Vec<_> = decode_events(stream::iter(chunks)).collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_ref().unwrap().status, "Waiting");
    assert!(matches!(events[1], Err(PullError::Stream(_))));
}

#[tokio::test]
async fn test_empty_body_yields_nothing() {
    assert!(collect(&[]).await.is_empty());
    assert!(collect(&["  \n"]).await.is_empty());
}
