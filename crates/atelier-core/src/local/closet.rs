//! Filesystem closet.
//!
//! Serves image files from `<root>/tops`, `<root>/bottoms` and
//! `<root>/dresses` as items. Used both as a catalog and as the wardrobe.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{Category, Item, ToolError};
use crate::tools::{Catalog, SearchQuery, ToolId, Wardrobe};

pub const CLOSET_SOURCE: &str = "closet";

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-]+").expect("Invalid separator pattern"));

/// Catalog and wardrobe backed by a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalCloset {
    root: PathBuf,
}

impl LocalCloset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every image of `category`, sorted by file name. A missing directory
    /// is an empty category.
    pub async fn list(&self, category: Category, tool: ToolId) -> Result<Vec<Item>, ToolError> {
        let dir = self.root.join(category.plural());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "closet category directory missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_error(tool, &dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(tool, &dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && is_image(&name) {
                names.push(name);
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| closet_item(category, &name))
            .collect())
    }
}

#[async_trait]
impl Catalog for LocalCloset {
    fn source(&self) -> &str {
        CLOSET_SOURCE
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Item>, ToolError> {
        let items = self.list(query.category, ToolId::SearchCatalog).await?;
        let words: Vec<String> = query
            .query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let (matching, rest): (Vec<Item>, Vec<Item>) = items.into_iter().partition(|item| {
            let title = item.title.to_lowercase();
            words.iter().any(|w| title.contains(w.as_str()))
        });
        let mut results = if matching.is_empty() { rest } else { matching };
        results.truncate(query.filters.limit);
        Ok(results)
    }
}

#[async_trait]
impl Wardrobe for LocalCloset {
    async fn fetch(&self, categories: &[Category]) -> Result<Vec<Item>, ToolError> {
        let mut items = Vec::new();
        for &category in categories {
            items.extend(self.list(category, ToolId::FetchWardrobe).await?);
        }
        Ok(items)
    }
}

fn closet_item(category: Category, file_name: &str) -> Item {
    let relative = format!("{}/{}", category.plural(), file_name);
    let digest = hex::encode(Sha256::digest(relative.as_bytes()));
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Item::new(
        format!("local-{}-{}", category, &digest[..8]),
        title_from_stem(&stem),
        category,
        format!("/{relative}"),
    )
    .with_provenance(CLOSET_SOURCE)
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// `linen_shirt-white` → `Linen Shirt White`.
pub fn title_from_stem(stem: &str) -> String {
    SEPARATORS
        .replace_all(stem, " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn io_error(tool: ToolId, dir: &Path, error: std::io::Error) -> ToolError {
    ToolError::unavailable(tool.as_str(), format!("{}: {error}", dir.display()))
}
