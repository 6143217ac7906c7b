use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use recipe_pages::delivery::{
    deliver_html, DocumentSink, FinalizeError, Finalizer, MovieFinalizer, RecipeFinalizer,
};
use recipe_pages::dialogue::Record;
use recipe_pages::metadata::{MetadataError, MetadataProvider, MovieMetadata};

/// Remembers what it was sent, reading the file while it still exists
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(PathBuf, String)>>,
    fail: bool,
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn send_document(&self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.sent.lock().unwrap().push((path.to_path_buf(), content));
        if self.fail {
            anyhow::bail!("telegram is down");
        }
        Ok(())
    }
}

struct StaticMetadata(Result<Option<MovieMetadata>, MetadataError>);

#[async_trait]
impl MetadataProvider for StaticMetadata {
    async fn lookup(&self, _title: &str) -> Result<Option<MovieMetadata>, MetadataError> {
        self.0.clone()
    }
}

fn recipe_record() -> Record {
    Record {
        flow: "recipe".to_string(),
        fields: vec![
            ("title".to_string(), "Chocolate Cake".to_string()),
            ("description".to_string(), "Rich & moist".to_string()),
            ("image_url".to_string(), "https://img.example/cake.png".to_string()),
        ],
        multi_value_fields: vec![],
    }
}

fn movie_record(links: &[&str]) -> Record {
    Record {
        flow: "movie".to_string(),
        fields: vec![("title".to_string(), "Alien".to_string())],
        multi_value_fields: vec![(
            "links".to_string(),
            links.iter().map(|l| l.to_string()).collect(),
        )],
    }
}

#[tokio::test]
async fn test_recipe_is_sent_then_deleted() {
    let sink = RecordingSink::default();
    let delivered = RecipeFinalizer.finalize(&recipe_record(), &sink).await.unwrap();
    assert_eq!(delivered.file_name, "Chocolate_Cake.html");

    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (path, content) = &sent[0];
    assert_eq!(path.file_name().unwrap(), "Chocolate_Cake.html");
    assert!(content.contains("<h1>Chocolate Cake</h1>"));
    assert!(content.contains("Rich &amp; moist"));
    assert_eq!(delivered.bytes, content.len());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_file_is_deleted_when_sending_fails() {
    let sink = RecordingSink {
        fail: true,
        ..Default::default()
    };
    let err = RecipeFinalizer
        .finalize(&recipe_record(), &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, FinalizeError::Delivery(ref msg) if msg.contains("telegram is down")));

    let sent = sink.sent.lock().unwrap();
    assert!(!sent[0].0.exists());
}

#[tokio::test]
async fn test_recipe_missing_field_is_render_error() {
    let mut record = recipe_record();
    record.fields.pop();
    let sink = RecordingSink::default();
    let err = RecipeFinalizer.finalize(&record, &sink).await.unwrap_err();
    assert!(matches!(err, FinalizeError::Render(_)));
    assert!(sink.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_movie_with_no_links_is_rejected() {
    let sink = RecordingSink::default();
    let err = MovieFinalizer::default()
        .finalize(&movie_record(&[]), &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, FinalizeError::Validation(_)));
    assert!(sink.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_movie_is_enriched_with_metadata() {
    let metadata = MovieMetadata {
        year: Some("1979".to_string()),
        plot: Some("In space no one can hear you scream.".to_string()),
        poster: Some("https://img.example/alien.jpg".to_string()),
        ..Default::default()
    };
    let finalizer = MovieFinalizer::new(Some(Arc::new(StaticMetadata(Ok(Some(metadata))))));
    let sink = RecordingSink::default();
    finalizer
        .finalize(&movie_record(&["https://dl.example/1", "https://dl.example/2"]), &sink)
        .await
        .unwrap();

    let sent = sink.sent.lock().unwrap();
    let content = &sent[0].1;
    assert!(content.contains("1979"));
    assert!(content.contains("In space no one can hear you scream."));
    assert!(content.contains("https://img.example/alien.jpg"));
    assert!(content.contains("https://dl.example/2"));
}

#[tokio::test]
async fn test_metadata_failure_still_delivers() {
    let finalizer = MovieFinalizer::new(Some(Arc::new(StaticMetadata(Err(
        MetadataError::CircuitOpen,
    )))));
    let sink = RecordingSink::default();
    let delivered = finalizer
        .finalize(&movie_record(&["https://dl.example/1"]), &sink)
        .await
        .unwrap();
    assert_eq!(delivered.file_name, "Alien.html");
    assert!(sink.sent.lock().unwrap()[0].1.contains("https://dl.example/1"));
}

#[tokio::test]
async fn test_deliver_html_uses_given_name() {
    let sink = RecordingSink::default();
    let delivered = deliver_html("page.html", "<p>hi</p>", &sink).await.unwrap();
    assert_eq!(delivered.bytes, 9);
    assert_eq!(sink.sent.lock().unwrap()[0].1, "<p>hi</p>");
}
