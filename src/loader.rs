//! Lazy-loading state machine for the markup layer.
//!
//! Drives a single image from placeholder to full derivative:
//!
//! ```text
//!          mount (priority/eager)
//!   Idle ─────────────────────────────▶ Loading ──succeeded──▶ Loaded
//!     │                                   ▲    └───failed────▶ Errored
//!     │ mount (lazy)                      │
//!     ▼                                   │
//!   Observing ─────────visible────────────┘
//! ```
//!
//! The machine does no I/O. The host feeds it [`LoadEvent`]s from its
//! visibility observer and image fetcher, and starts a fetch whenever a
//! transition returns a [`FetchRequest`]. Events that make no sense in the
//! current state (a late visibility callback after loading, a duplicate
//! completion) are ignored.

use crate::manifest::ProcessedImageManifest;
use crate::responsive::preload_link;

/// Where an image is in its loading lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    /// Waiting for the element to become visible.
    Observing,
    Loading,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    /// The element was attached to the page.
    Mounted,
    /// The element scrolled into (or near) the viewport.
    Visible,
    /// The full image finished loading.
    Succeeded,
    /// The full image failed to load.
    Failed,
}

/// Loading strategy for non-priority images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadingStrategy {
    #[default]
    Lazy,
    Eager,
}

/// Tells the host to start fetching the full image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub src: String,
    pub src_set: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageLoader {
    src: String,
    src_set: Option<String>,
    placeholder: Option<String>,
    priority: bool,
    strategy: LoadingStrategy,
    state: LoadState,
}

impl ImageLoader {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            src_set: None,
            placeholder: None,
            priority: false,
            strategy: LoadingStrategy::default(),
            state: LoadState::Idle,
        }
    }

    /// Loader for a processed image: `src`, `srcSet` and placeholder
    /// come from the manifest.
    pub fn from_manifest(manifest: &ProcessedImageManifest) -> Self {
        let src_set = manifest.src_set_attr();
        Self {
            src_set: (!src_set.is_empty()).then_some(src_set),
            placeholder: manifest.placeholder.clone(),
            ..Self::new(manifest.src.clone())
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_src_set(mut self, src_set: impl Into<String>) -> Self {
        self.src_set = Some(src_set.into());
        self
    }

    /// Priority images skip visibility observation entirely.
    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_strategy(mut self, strategy: LoadingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// True until the image has either loaded or failed.
    pub fn is_loading(&self) -> bool {
        !matches!(self.state, LoadState::Loaded | LoadState::Errored)
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn has_error(&self) -> bool {
        self.state == LoadState::Errored
    }

    /// What the element should display right now: the full image once
    /// loaded, otherwise the placeholder (or nothing).
    pub fn current_src(&self) -> &str {
        match self.state {
            LoadState::Loaded => &self.src,
            _ => self.placeholder.as_deref().unwrap_or(""),
        }
    }

    /// Preload hint for priority images.
    pub fn preload_hint(&self) -> Option<String> {
        (self.priority && !self.src.is_empty())
            .then(|| preload_link(&self.src, self.src_set.as_deref(), None))
    }

    fn begin_fetch(&mut self) -> Option<FetchRequest> {
        self.state = LoadState::Loading;
        Some(FetchRequest {
            src: self.src.clone(),
            src_set: self.src_set.clone(),
        })
    }

    /// Apply an event. Returns a fetch request when loading should start.
    pub fn handle(&mut self, event: LoadEvent) -> Option<FetchRequest> {
        let before = self.state;
        let request = match (self.state, event) {
            (LoadState::Idle, LoadEvent::Mounted) => {
                if self.priority || self.strategy == LoadingStrategy::Eager {
                    self.begin_fetch()
                } else {
                    self.state = LoadState::Observing;
                    None
                }
            }
            (LoadState::Observing, LoadEvent::Visible) => self.begin_fetch(),
            (LoadState::Loading, LoadEvent::Succeeded) => {
                self.state = LoadState::Loaded;
                None
            }
            (LoadState::Loading, LoadEvent::Failed) => {
                self.state = LoadState::Errored;
                None
            }
            _ => None,
        };
        if before != self.state {
            tracing::trace!(src = %self.src, from = ?before, to = ?self.state, "image load transition");
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ResponsiveCandidate;
    use std::collections::BTreeMap;

    fn lazy() -> ImageLoader {
        ImageLoader::new("/images/a.webp").with_placeholder("data:image/jpeg;base64,AA")
    }

    #[test]
    fn initial_state_shows_placeholder() {
        let loader = lazy();
        assert_eq!(loader.state(), LoadState::Idle);
        assert!(loader.is_loading());
        assert_eq!(loader.current_src(), "data:image/jpeg;base64,AA");
    }

    #[test]
    fn no_placeholder_shows_nothing() {
        assert_eq!(ImageLoader::new("/a.webp").current_src(), "");
    }

    #[test]
    fn lazy_image_waits_for_visibility() {
        let mut loader = lazy();
        assert_eq!(loader.handle(LoadEvent::Mounted), None);
        assert_eq!(loader.state(), LoadState::Observing);

        let request = loader.handle(LoadEvent::Visible).unwrap();
        assert_eq!(request.src, "/images/a.webp");
        assert_eq!(loader.state(), LoadState::Loading);
    }

    #[test]
    fn priority_short_circuits_to_loading() {
        let mut loader = lazy().with_priority(true);
        assert!(loader.handle(LoadEvent::Mounted).is_some());
        assert_eq!(loader.state(), LoadState::Loading);
    }

    #[test]
    fn eager_short_circuits_to_loading() {
        let mut loader = lazy().with_strategy(LoadingStrategy::Eager);
        assert!(loader.handle(LoadEvent::Mounted).is_some());
        assert_eq!(loader.state(), LoadState::Loading);
    }

    #[test]
    fn success_swaps_in_full_image() {
        let mut loader = lazy().with_priority(true);
        loader.handle(LoadEvent::Mounted);
        loader.handle(LoadEvent::Succeeded);

        assert!(loader.is_loaded());
        assert!(!loader.is_loading());
        assert_eq!(loader.current_src(), "/images/a.webp");
    }

    #[test]
    fn failure_keeps_placeholder() {
        let mut loader = lazy().with_priority(true);
        loader.handle(LoadEvent::Mounted);
        loader.handle(LoadEvent::Failed);

        assert!(loader.has_error());
        assert!(!loader.is_loading());
        assert_eq!(loader.current_src(), "data:image/jpeg;base64,AA");
    }

    #[test]
    fn fetch_starts_only_once() {
        let mut loader = lazy();
        loader.handle(LoadEvent::Mounted);
        assert!(loader.handle(LoadEvent::Visible).is_some());
        // Observer fires again while the fetch is in flight
        assert!(loader.handle(LoadEvent::Visible).is_none());
        loader.handle(LoadEvent::Succeeded);
        assert!(loader.handle(LoadEvent::Visible).is_none());
        assert!(loader.handle(LoadEvent::Mounted).is_none());
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let mut loader = lazy();
        assert!(loader.handle(LoadEvent::Succeeded).is_none());
        assert!(loader.handle(LoadEvent::Visible).is_none());
        assert_eq!(loader.state(), LoadState::Idle);

        loader.handle(LoadEvent::Mounted);
        loader.handle(LoadEvent::Failed);
        assert_eq!(loader.state(), LoadState::Observing);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut loader = lazy().with_priority(true);
        loader.handle(LoadEvent::Mounted);
        loader.handle(LoadEvent::Failed);
        loader.handle(LoadEvent::Succeeded);
        assert_eq!(loader.state(), LoadState::Errored);
    }

    #[test]
    fn from_manifest_carries_src_set_and_placeholder() {
        let manifest = ProcessedImageManifest {
            src: "/images/a.webp".into(),
            src_set: vec![ResponsiveCandidate {
                url: "/images/a-640w.webp".into(),
                width: 640,
            }],
            formats: BTreeMap::new(),
            placeholder: Some("data:x".into()),
            width: 1000,
            height: 750,
        };
        let mut loader = ImageLoader::from_manifest(&manifest).with_priority(true);
        assert_eq!(loader.current_src(), "data:x");

        let request = loader.handle(LoadEvent::Mounted).unwrap();
        assert_eq!(request.src_set.as_deref(), Some("/images/a-640w.webp 640w"));
    }

    #[test]
    fn from_degraded_manifest_has_no_src_set() {
        let loader = ImageLoader::from_manifest(&ProcessedImageManifest::degraded("/a.jpg"));
        assert_eq!(loader.src_set, None);
        assert_eq!(loader.current_src(), "");
    }

    #[test]
    fn preload_hint_only_for_priority() {
        assert_eq!(lazy().preload_hint(), None);
        let hint = lazy().with_priority(true).preload_hint().unwrap();
        assert!(hint.contains(r#"href="/images/a.webp""#));
    }
}
