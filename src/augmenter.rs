use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::document::{Element, FeedDocument, Node};
use crate::gemini::{collect_chunks, KeywordModel};
use crate::keywords::{build_prompt, normalize_keywords};
use crate::types::Result;

/// Re-tags every feed document in a directory: one generation call per item
/// that carries a description, one `keyword` element per item afterwards.
pub struct KeywordAugmenter {
    model: Box<dyn KeywordModel>,
}

impl KeywordAugmenter {
    pub fn new(model: Box<dyn KeywordModel>) -> Self {
        Self { model }
    }

    /// Process every `*.xml` file in `dir` (filesystem order). A malformed
    /// document aborts the whole run. Returns the number of files written.
    pub async fn run(&self, dir: &Path) -> Result<usize> {
        let files = discover_feed_files(dir)?;
        if files.is_empty() {
            warn!("No feed files found in {}", dir.display());
        }
        for path in &files {
            self.process_file(path).await?;
        }
        Ok(files.len())
    }

    /// Read, augment and overwrite one feed file in place.
    pub async fn process_file(&self, path: &Path) -> Result<()> {
        let mut doc = FeedDocument::load(path)?;
        let tagged = self.augment(&mut doc, &path.display().to_string()).await?;
        doc.save(path)?;
        info!("Tagged {} items in {}", tagged, path.display());
        Ok(())
    }

    /// Tag every item of the document that has a non-empty description.
    /// Items without one are left entirely alone, stale `keyword` included.
    /// Returns the number of items tagged.
    pub async fn augment(&self, doc: &mut FeedDocument, label: &str) -> Result<usize> {
        // Collect targets first so no document borrow is held across the
        // generation calls.
        let targets: Vec<(usize, String)> = doc
            .channel()?
            .children
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| match node {
                Node::Element(el) if el.name == "item" => {
                    let description = el.first_child("description")?.text();
                    if description.trim().is_empty() {
                        None
                    } else {
                        Some((idx, description))
                    }
                }
                _ => None,
            })
            .collect();

        let tagged = targets.len();
        for (idx, description) in targets {
            let keywords = self.generate_keywords(&description).await;
            info!("{}: {}", label, keywords);

            let channel = doc.channel_mut()?;
            if let Some(Node::Element(item)) = channel.children.get_mut(idx) {
                item.remove_children("keyword");
                item.insert_after("description", Element::with_text("keyword", keywords));
            }
        }
        Ok(tagged)
    }

    /// One streamed generation call. Failures degrade to whatever text was
    /// collected before the error, possibly nothing.
    async fn generate_keywords(&self, description: &str) -> String {
        let prompt = build_prompt(description);
        let raw = match self.model.stream_keywords(&prompt).await {
            Ok(stream) => collect_chunks(stream).await,
            Err(e) => {
                error!("Gemini API error: {}", e);
                String::new()
            }
        };
        normalize_keywords(&raw)
    }
}

/// All regular files in `dir` with an `xml` extension; order is whatever
/// the filesystem yields.
pub fn discover_feed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("xml") {
            files.push(path);
        }
    }
    Ok(files)
}
