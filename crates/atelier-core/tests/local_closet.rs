//! Filesystem closet as catalog and wardrobe.

use std::fs;

use atelier_core::domain::Category;
use atelier_core::tools::{Catalog, SearchFilters, SearchQuery, Wardrobe};
use atelier_core::LocalCloset;
use tempfile::TempDir;

fn closet() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tops")).unwrap();
    fs::create_dir_all(dir.path().join("bottoms")).unwrap();
    for name in ["navy_linen-shirt.png", "white_tee.jpg", "striped_polo.webp", "notes.txt"] {
        fs::write(dir.path().join("tops").join(name), b"img").unwrap();
    }
    fs::write(dir.path().join("bottoms/tan_chinos.jpeg"), b"img").unwrap();
    dir
}

fn query(category: Category, text: &str, limit: usize) -> SearchQuery {
    SearchQuery {
        category,
        query: text.to_string(),
        filters: SearchFilters {
            color_palette: vec![],
            limit,
        },
    }
}

#[tokio::test]
async fn search_matches_query_words_in_titles() {
    let dir = closet();
    let closet = LocalCloset::new(dir.path());

    let items = closet
        .search(&query(Category::Top, "best navy summer top", 10))
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Navy Linen Shirt");
    assert_eq!(items[0].image.as_str(), "/tops/navy_linen-shirt.png");
    assert_eq!(items[0].provenance.as_deref(), Some("closet"));
}

#[tokio::test]
async fn search_without_matches_returns_first_files() {
    let dir = closet();
    let closet = LocalCloset::new(dir.path());

    let items = closet
        .search(&query(Category::Top, "velvet blazer", 2))
        .await
        .unwrap();

    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Navy Linen Shirt", "Striped Polo"]);
}

#[tokio::test]
async fn missing_category_directory_is_empty() {
    let dir = closet();
    let closet = LocalCloset::new(dir.path());

    let items = closet
        .search(&query(Category::Dress, "white dress", 10))
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn wardrobe_lists_every_requested_category() {
    let dir = closet();
    let closet = LocalCloset::new(dir.path());

    let items = closet.fetch(&Category::ALL).await.unwrap();

    assert_eq!(items.len(), 4, "text files are skipped");
    assert_eq!(
        items.iter().filter(|i| i.category == Category::Bottom).count(),
        1
    );
    assert!(items
        .iter()
        .all(|i| i.id.as_str().starts_with(&format!("local-{}-", i.category))));
}
