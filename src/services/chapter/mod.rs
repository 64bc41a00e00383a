// Chapter input modes: templated URL pattern or a chapter page URL

pub mod comick;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::core::errors::{ChapterError, ResolutionError};
use crate::core::types::{Chapter, PageUrl};

pub use comick::ComickResolver;

/// Token replaced by the page number in pattern mode
pub const PAGE_PLACEHOLDER: &str = "{{i}}";

pub const DEFAULT_START_PAGE: u32 = 1;
pub const DEFAULT_END_PAGE: u32 = 5;

/// Largest page range a pattern may expand to
pub const MAX_PATTERN_PAGES: u32 = 500;

/// Turns a chapter URL into the ordered list of its page-image URLs.
#[async_trait]
pub trait ChapterResolver: Send + Sync {
    async fn resolve(&self, chapter_url: &str) -> Result<Vec<PageUrl>, ResolutionError>;
}

/// How the user described the chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterSource {
    /// URL template containing [`PAGE_PLACEHOLDER`], expanded over `start..=end`
    Pattern {
        template: String,
        start: u32,
        end: u32,
    },
    /// Chapter page handed to a [`ChapterResolver`]
    Url(String),
}

impl ChapterSource {
    /// Pick the mode from the presence of the placeholder token. The page
    /// range only matters in pattern mode.
    pub fn parse(input: &str, start: u32, end: u32) -> Result<Self, ChapterError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChapterError::EmptyInput);
        }

        if input.contains(PAGE_PLACEHOLDER) {
            check_range(start, end)?;
            Ok(ChapterSource::Pattern {
                template: input.to_string(),
                start,
                end,
            })
        } else {
            Ok(ChapterSource::Url(input.to_string()))
        }
    }
}

fn check_range(start: u32, end: u32) -> Result<(), ChapterError> {
    if start > end {
        return Err(ChapterError::InvalidRange { start, end });
    }
    if u64::from(end) - u64::from(start) + 1 > u64::from(MAX_PATTERN_PAGES) {
        return Err(ChapterError::RangeTooLarge {
            start,
            end,
            max: MAX_PATTERN_PAGES,
        });
    }
    Ok(())
}

/// Expand a URL template over an inclusive page range. Only the first
/// placeholder occurrence is substituted.
pub fn expand_pattern(template: &str, start: u32, end: u32) -> Result<Vec<PageUrl>, ChapterError> {
    check_range(start, end)?;
    Ok((start..=end)
        .map(|page| PageUrl::new(template.replacen(PAGE_PLACEHOLDER, &page.to_string(), 1)))
        .collect())
}

/// Build a chapter from either input mode. An empty URL list aborts the load.
#[instrument(skip(resolver))]
pub async fn load_chapter(
    source: &ChapterSource,
    resolver: &dyn ChapterResolver,
) -> Result<Chapter, ChapterError> {
    let urls = match source {
        ChapterSource::Pattern {
            template,
            start,
            end,
        } => {
            info!("Detected URL pattern, generating pages {}..={}", start, end);
            expand_pattern(template, *start, *end)?
        }
        ChapterSource::Url(url) => {
            info!("Detected chapter URL, resolving page list");
            resolver.resolve(url).await?
        }
    };

    let chapter = Chapter::new(urls)?;
    info!("Chapter ready with {} pages", chapter.len());
    Ok(chapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver(Vec<PageUrl>);

    #[async_trait]
    impl ChapterResolver for StaticResolver {
        async fn resolve(&self, _chapter_url: &str) -> Result<Vec<PageUrl>, ResolutionError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_expand_pattern_inclusive() {
        let urls = expand_pattern("https://s/{{i}}.png", 2, 4).unwrap();
        let urls: Vec<&str> = urls.iter().map(PageUrl::as_str).collect();
        assert_eq!(urls, ["https://s/2.png", "https://s/3.png", "https://s/4.png"]);
    }

    #[test]
    fn test_expand_single_page_and_first_occurrence_only() {
        let urls = expand_pattern("https://s/{{i}}/{{i}}.png", 7, 7).unwrap();
        assert_eq!(urls, vec![PageUrl::new("https://s/7/{{i}}.png")]);
    }

    #[test]
    fn test_parse_selects_mode() {
        assert_eq!(
            ChapterSource::parse(" https://s/{{i}}.png ", 1, 3).unwrap(),
            ChapterSource::Pattern {
                template: "https://s/{{i}}.png".to_string(),
                start: 1,
                end: 3,
            }
        );
        // range is ignored without the placeholder
        assert_eq!(
            ChapterSource::parse("https://comick.io/comic/x/ab12-chapter-3-en", 9, 1).unwrap(),
            ChapterSource::Url("https://comick.io/comic/x/ab12-chapter-3-en".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            ChapterSource::parse("https://s/{{i}}.png", 5, 4),
            Err(ChapterError::InvalidRange { start: 5, end: 4 })
        ));
        assert!(matches!(
            ChapterSource::parse("   ", 1, 1),
            Err(ChapterError::EmptyInput)
        ));
    }

    #[test]
    fn test_oversized_range_rejected_before_expansion() {
        assert!(matches!(
            ChapterSource::parse("https://s/{{i}}.png", 0, u32::MAX),
            Err(ChapterError::RangeTooLarge { start: 0, end: u32::MAX, .. })
        ));
        assert!(matches!(
            expand_pattern("https://s/{{i}}.png", 1, MAX_PATTERN_PAGES + 1),
            Err(ChapterError::RangeTooLarge { .. })
        ));

        let urls = expand_pattern("https://s/{{i}}.png", 1, MAX_PATTERN_PAGES).unwrap();
        assert_eq!(urls.len(), MAX_PATTERN_PAGES as usize);
    }

    #[tokio::test]
    async fn test_load_chapter_from_resolver() {
        let resolver = StaticResolver(vec![PageUrl::new("a"), PageUrl::new("b")]);
        let source = ChapterSource::Url("https://comick.io/x".to_string());
        let chapter = load_chapter(&source, &resolver).await.unwrap();
        assert_eq!(chapter.len(), 2);
        assert_eq!(chapter.get(1), Some(&PageUrl::new("b")));
    }

    #[tokio::test]
    async fn test_load_chapter_without_pages_aborts() {
        let resolver = StaticResolver(Vec::new());
        let source = ChapterSource::Url("https://comick.io/x".to_string());
        assert!(matches!(
            load_chapter(&source, &resolver).await,
            Err(ChapterError::NoPages)
        ));
    }
}
