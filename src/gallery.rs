use crate::{
    api::ImageApi,
    error::Result,
    models::{GalleryItem, ImageEntry},
};
use std::sync::Arc;

pub const IMAGES_PER_PAGE: usize = 12;

pub const SAMPLE_NOTICE: &str = "Could not load images from server. Showing sample images instead.";

const SAMPLE_IMAGES: [(&str, &str, &str); 6] = [
    (
        "https://images.unsplash.com/photo-1675271591211-126817a53f83",
        "A futuristic cityscape with flying cars and neon lights",
        "2023-05-10T14:30:00Z",
    ),
    (
        "https://images.unsplash.com/photo-1682687982501-1e58ab814714",
        "A serene landscape with mountains and a lake at sunset",
        "2023-05-09T10:15:00Z",
    ),
    (
        "https://images.unsplash.com/photo-1686349719912-0a4c0a591c6c",
        "An abstract painting with vibrant colors and geometric shapes",
        "2023-05-08T16:45:00Z",
    ),
    (
        "https://images.unsplash.com/photo-1682687220063-4742bd7fd538",
        "A photorealistic portrait of a fantasy character with detailed features",
        "2023-05-07T09:20:00Z",
    ),
    (
        "https://images.unsplash.com/photo-1675271591211-126817a53f83",
        "A cozy cafe interior with warm lighting and people reading books",
        "2023-05-06T13:10:00Z",
    ),
    (
        "https://images.unsplash.com/photo-1682687982501-1e58ab814714",
        "An underwater scene with colorful coral reefs and tropical fish",
        "2023-05-05T11:30:00Z",
    ),
];

/// Where the listed items came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GallerySource {
    /// Nothing loaded yet.
    Empty,
    Live,
    /// The backend could not be reached; built-in samples are shown.
    Sample,
}

/// Browsable view over the backend's stored images.
pub struct Gallery {
    api: Arc<dyn ImageApi>,
    items: Vec<GalleryItem>,
    source: GallerySource,
    search: String,
    page: usize,
}

impl Gallery {
    pub fn new(api: Arc<dyn ImageApi>) -> Self {
        Self {
            api,
            items: Vec::new(),
            source: GallerySource::Empty,
            search: String::new(),
            page: 1,
        }
    }

    /// Reload the list. Falls back to the sample set when the backend fails.
    pub async fn refresh(&mut self) -> GallerySource {
        match self.api.list_images().await {
            Ok(entries) => {
                log::info!("📚 Loaded {} images", entries.len());
                self.items = entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, entry)| GalleryItem::from_entry(i + 1, entry))
                    .collect();
                self.source = GallerySource::Live;
            }
            Err(e) => {
                log::warn!("⚠️  Could not list images: {}", e);
                self.items = sample_items();
                self.source = GallerySource::Sample;
            }
        }
        self.page = self.page.clamp(1, self.total_pages().max(1));
        self.source
    }

    pub fn source(&self) -> GallerySource {
        self.source
    }

    pub fn notice(&self) -> Option<&'static str> {
        (self.source == GallerySource::Sample).then_some(SAMPLE_NOTICE)
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 1;
    }

    pub fn clear_search(&mut self) {
        self.set_search(String::new());
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn filtered(&self) -> Vec<&GalleryItem> {
        let term = self.search.trim();
        self.items
            .iter()
            .filter(|item| term.is_empty() || item.matches(term))
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().len().div_ceil(IMAGES_PER_PAGE)
    }

    /// Items on the current page.
    pub fn visible(&self) -> Vec<&GalleryItem> {
        self.filtered()
            .into_iter()
            .skip((self.page - 1) * IMAGES_PER_PAGE)
            .take(IMAGES_PER_PAGE)
            .collect()
    }

    /// Delete on the backend, then drop the item locally. On error nothing changes.
    pub async fn delete(&mut self, filename: &str) -> Result<()> {
        self.api.delete_image(filename).await?;
        self.items.retain(|item| item.filename != filename);
        self.set_page(self.page);
        log::info!("🗑️  Deleted {}", filename);
        Ok(())
    }
}

fn sample_items() -> Vec<GalleryItem> {
    SAMPLE_IMAGES
        .iter()
        .enumerate()
        .map(|(i, (url, prompt, created_at))| {
            let filename = url.rsplit('/').next().unwrap_or_default().to_string();
            let mut item = GalleryItem::from_entry(
                i + 1,
                ImageEntry {
                    filename,
                    url: None,
                    prompt: Some(prompt.to_string()),
                    created_at: Some(created_at.to_string()),
                },
            );
            item.url = url.to_string();
            item
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::SdError,
        models::{GenerationRequest, GenerationResponse, HealthStatus},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeBackend {
        entries: Option<Vec<ImageEntry>>,
        deleted: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    impl FakeBackend {
        fn with_prompts(prompts: &[&str]) -> Arc<Self> {
            let entries = prompts
                .iter()
                .enumerate()
                .map(|(i, p)| ImageEntry {
                    filename: format!("img-{}.png", i),
                    url: None,
                    prompt: Some(p.to_string()),
                    created_at: Some("2024-01-01T00:00:00".into()),
                })
                .collect();
            Arc::new(Self {
                entries: Some(entries),
                deleted: Mutex::new(Vec::new()),
                fail_delete: false,
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                entries: None,
                deleted: Mutex::new(Vec::new()),
                fail_delete: true,
            })
        }
    }

    #[async_trait]
    impl ImageApi for FakeBackend {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            Err(SdError::Transport("not used".into()))
        }

        async fn list_images(&self) -> Result<Vec<ImageEntry>> {
            self.entries
                .clone()
                .ok_or_else(|| SdError::Transport("connection refused".into()))
        }

        async fn delete_image(&self, filename: &str) -> Result<()> {
            if self.fail_delete {
                return Err(SdError::Server {
                    status: 404,
                    detail: "Image not found".into(),
                });
            }
            self.deleted.lock().unwrap().push(filename.to_string());
            Ok(())
        }

        async fn fetch_image(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn health(&self) -> Result<HealthStatus> {
            Err(SdError::Transport("not used".into()))
        }
    }

    #[tokio::test]
    async fn live_listing_builds_static_urls() {
        let mut gallery = Gallery::new(FakeBackend::with_prompts(&["fox", "owl"]));
        assert_eq!(gallery.refresh().await, GallerySource::Live);
        assert!(gallery.notice().is_none());

        let visible = gallery.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].url, "/static/images/img-0.png");
        assert_eq!(visible[1].id, 2);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_resets_page() {
        let prompts: Vec<String> = (0..30)
            .map(|i| if i % 3 == 0 { format!("Red Fox {}", i) } else { format!("owl {}", i) })
            .collect();
        let refs: Vec<&str> = prompts.iter().map(String::as_str).collect();
        let mut gallery = Gallery::new(FakeBackend::with_prompts(&refs));
        gallery.refresh().await;

        assert_eq!(gallery.total_pages(), 3);
        gallery.set_page(3);
        assert_eq!(gallery.visible().len(), 6);

        gallery.set_search("red fox");
        assert_eq!(gallery.page(), 1);
        assert_eq!(gallery.filtered().len(), 10);
        assert_eq!(gallery.total_pages(), 1);

        gallery.clear_search();
        assert_eq!(gallery.filtered().len(), 30);
    }

    #[tokio::test]
    async fn page_is_clamped() {
        let mut gallery = Gallery::new(FakeBackend::with_prompts(&["a", "b"]));
        gallery.refresh().await;
        gallery.set_page(9);
        assert_eq!(gallery.page(), 1);
        gallery.set_page(0);
        assert_eq!(gallery.page(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_shows_samples_with_notice() {
        let mut gallery = Gallery::new(FakeBackend::unreachable());
        assert_eq!(gallery.refresh().await, GallerySource::Sample);
        assert_eq!(gallery.notice(), Some(SAMPLE_NOTICE));
        assert_eq!(gallery.filtered().len(), 6);
        assert!(gallery.visible()[0].url.starts_with("https://"));

        gallery.set_search("CORAL");
        assert_eq!(gallery.filtered().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_item_only_on_success() {
        let backend = FakeBackend::with_prompts(&["fox", "owl"]);
        let mut gallery = Gallery::new(backend.clone());
        gallery.refresh().await;

        gallery.delete("img-0.png").await.unwrap();
        assert_eq!(gallery.filtered().len(), 1);
        assert_eq!(backend.deleted.lock().unwrap().as_slice(), ["img-0.png"]);

        let mut offline = Gallery::new(FakeBackend::unreachable());
        offline.refresh().await;
        let before = offline.filtered().len();
        let err = offline.delete("photo-1675271591211-126817a53f83").await;
        assert!(matches!(err, Err(SdError::Server { status: 404, .. })));
        assert_eq!(offline.filtered().len(), before);
    }
}
