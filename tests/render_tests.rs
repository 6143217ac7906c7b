use chrono::{TimeZone, Utc};
use recipe_pages::dialogue::Record;
use recipe_pages::metadata::MovieMetadata;
use recipe_pages::render::{
    render_movie, render_recipe, MovieDocument, RecipeDocument, RenderError,
};

fn recipe() -> RecipeDocument {
    RecipeDocument {
        title: "Mom's <Lasagna>".to_string(),
        description: "Layers & layers".to_string(),
        image_url: "https://img.example/l.png?a=1&b=2".to_string(),
        generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
    }
}

#[test]
fn test_recipe_page_structure() {
    let html = render_recipe(&recipe());
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Mom&#39;s &lt;Lasagna&gt; Recipe</title>"));
    assert!(html.contains(r#"<meta name="description" content="Layers &amp; layers" />"#));
    assert!(html.contains(r#"<img src="https://img.example/l.png?a=1&amp;b=2""#));
    assert!(html.contains("<h2>Recipe Overview</h2>"));
    assert!(html.contains("Generated on 2024-05-01 12:30 UTC"));
    assert!(!html.contains("<Lasagna>"));
}

#[test]
fn test_movie_page_without_metadata() {
    let document = MovieDocument {
        title: "Alien".to_string(),
        links: vec!["https://dl.example/a".to_string(), "https://dl.example/b".to_string()],
        metadata: None,
        generated_at: Utc::now(),
    };
    let html = render_movie(&document);
    assert!(html.contains("<h1>Alien</h1>"));
    assert!(html.contains(r#"<a href="https://dl.example/a" rel="noopener noreferrer">Link 1</a>"#));
    assert!(html.contains("Link 2"));
    assert!(!html.contains("<img"));
    assert!(!html.contains("<h2>Plot</h2>"));
}

#[test]
fn test_movie_page_with_metadata() {
    let document = MovieDocument {
        title: "Alien".to_string(),
        links: vec!["https://dl.example/a".to_string()],
        metadata: Some(MovieMetadata {
            year: Some("1979".to_string()),
            director: Some("Ridley Scott".to_string()),
            plot: Some("<b>Scary</b>".to_string()),
            ..Default::default()
        }),
        generated_at: Utc::now(),
    };
    let html = render_movie(&document);
    assert!(html.contains("<strong>Year:</strong> 1979"));
    assert!(html.contains("<strong>Director:</strong> Ridley Scott"));
    assert!(html.contains("&lt;b&gt;Scary&lt;/b&gt;"));
    assert!(!html.contains("Genre"));
}

#[test]
fn test_documents_from_records() {
    let record = Record {
        flow: "movie".to_string(),
        fields: vec![("title".to_string(), "  Alien ".to_string())],
        multi_value_fields: vec![("links".to_string(), vec![" https://x.example ".to_string()])],
    };
    let document = MovieDocument::from_record(&record).unwrap();
    assert_eq!(document.title, "Alien");
    assert_eq!(document.links, vec!["https://x.example".to_string()]);

    let err = RecipeDocument::from_record(&record).unwrap_err();
    assert_eq!(err, RenderError::MissingField("description".to_string()));
}
