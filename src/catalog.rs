use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::http::{FetchError, RetryPolicy, get_text_with_retries};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoQuality {
    pub(crate) quality: u32,
    pub(crate) video_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CdnGroup {
    #[serde(default)]
    pub(crate) video_path_list: Vec<VideoQuality>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Episode {
    pub(crate) chapter_id: String,
    #[serde(default)]
    pub(crate) chapter_index: u32,
    #[serde(default)]
    pub(crate) chapter_name: String,
    #[serde(default)]
    pub(crate) chapter_img: Option<String>,
    #[serde(default)]
    pub(crate) cdn_list: Vec<CdnGroup>,
}

impl Episode {
    /// Renditions of the primary CDN group, in API order.
    pub(crate) fn renditions(&self) -> &[VideoQuality] {
        self.cdn_list
            .first()
            .map(|group| group.video_path_list.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn display_name(&self) -> String {
        if self.chapter_name.trim().is_empty() {
            format!("Episode {}", self.chapter_index + 1)
        } else {
            self.chapter_name.trim().to_string()
        }
    }
}

/// Supplies the ordered episode list of a content item. An empty list means
/// the fetch failed or the item has nothing playable; callers do not retry.
pub(crate) trait EpisodeSource {
    fn fetch_episodes(&self, content_id: &str) -> Vec<Episode>;
}

/// Browse listings the API serves as plain arrays of dramas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Listing {
    ForYou,
    Latest,
    Trending,
}

impl Listing {
    fn endpoint(self) -> &'static str {
        match self {
            Listing::ForYou => "foryou",
            Listing::Latest => "latest",
            Listing::Trending => "Trending",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Listing::ForYou => "for you",
            Listing::Latest => "latest",
            Listing::Trending => "trending",
        }
    }
}

/// A drama as listed by browse and search, reduced to what a listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DramaCard {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) tags: Vec<String>,
    pub(crate) episodes: Option<u32>,
    pub(crate) is_new: bool,
}

const MAX_CARD_TAGS: usize = 3;
const NEW_CORNER: &str = "Terbaru";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireDrama {
    book_id: Value,
    book_name: Option<String>,
    tag_names: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    tag_v3s: Option<Vec<WireTag>>,
    chapter_count: Value,
    corner: Option<WireCorner>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireTag {
    tag_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCorner {
    name: Option<String>,
}

impl WireDrama {
    fn into_card(self) -> Option<DramaCard> {
        let id = match self.book_id {
            Value::String(id) => id.trim().to_string(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        if id.is_empty() {
            return None;
        }
        let tags = self
            .tag_names
            .or(self.tags)
            .or_else(|| {
                self.tag_v3s
                    .map(|tags| tags.into_iter().filter_map(|tag| tag.tag_name).collect())
            })
            .unwrap_or_default()
            .into_iter()
            .filter(|tag| !tag.trim().is_empty())
            .take(MAX_CARD_TAGS)
            .collect();
        let episodes = match &self.chapter_count {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(n) => n.trim().parse::<u32>().ok(),
            _ => None,
        };
        Some(DramaCard {
            id,
            title: self.book_name.unwrap_or_default().trim().to_string(),
            tags,
            episodes,
            is_new: self
                .corner
                .and_then(|corner| corner.name)
                .is_some_and(|name| name == NEW_CORNER),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CatalogClient {
    base_url: String,
    policy: RetryPolicy,
}

impl CatalogClient {
    pub(crate) fn new(config: &Config) -> Self {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        Self {
            base_url: config.api_base_url.trim().trim_end_matches('/').to_string(),
            policy: RetryPolicy {
                connect_timeout: timeout,
                read_timeout: timeout,
                attempts: config.fetch_attempts,
                retry_delay: Duration::from_millis(500),
            },
        }
    }

    fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<String, FetchError> {
        if self.base_url.is_empty() {
            return Err(FetchError::NotConfigured);
        }

        let mut headers = vec![
            ("User-Agent", BROWSER_USER_AGENT.to_string()),
            ("Accept", "application/json".to_string()),
        ];
        if let Some(origin) = origin_of(&self.base_url) {
            headers.push(("Referer", format!("{origin}/")));
        }
        let url = format!("{}/{endpoint}", self.base_url);
        get_text_with_retries(&url, &headers, query, &self.policy)
    }

    fn request_episodes(&self, content_id: &str) -> Result<Vec<Episode>, FetchError> {
        let query = vec![("bookId".to_string(), content_id.to_string())];
        let body = self.get("allepisode", &query)?;
        let parsed = parse_episodes(&body)?;
        if parsed.skipped > 0 {
            warn!(
                "ignored {} malformed episode(s) for content {content_id}",
                parsed.skipped
            );
        }
        Ok(parsed.episodes)
    }

    pub(crate) fn browse(&self, listing: Listing) -> Result<Vec<DramaCard>, FetchError> {
        let body = self.get(listing.endpoint(), &[])?;
        let cards = cards_from(&body, listing.label())?;
        info!("fetched {} {} drama(s)", cards.len(), listing.label());
        Ok(cards)
    }

    /// A blank query matches nothing and sends no request.
    pub(crate) fn search(&self, query: &str) -> Result<Vec<DramaCard>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.get("search", &[("query".to_string(), query.to_string())])?;
        cards_from(&body, "search")
    }

    pub(crate) fn popular_searches(&self) -> Result<Vec<String>, FetchError> {
        let body = self.get("populersearch", &[])?;
        Ok(decode_array(&body, "popular searches")?
            .into_iter()
            .filter_map(|item| match item {
                Value::String(term) if !term.trim().is_empty() => Some(term.trim().to_string()),
                _ => None,
            })
            .collect())
    }
}

fn cards_from(body: &str, what: &str) -> Result<Vec<DramaCard>, FetchError> {
    let parsed = parse_cards(body)?;
    if parsed.skipped > 0 {
        warn!("ignored {} malformed entries in the {what} listing", parsed.skipped);
    }
    Ok(parsed.cards)
}

impl EpisodeSource for CatalogClient {
    fn fetch_episodes(&self, content_id: &str) -> Vec<Episode> {
        match self.request_episodes(content_id) {
            Ok(episodes) => {
                info!("fetched {} episode(s) for {content_id}", episodes.len());
                episodes
            }
            Err(err) => {
                warn!("episode fetch for {content_id} failed: {err}");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ParsedEpisodes {
    pub(crate) episodes: Vec<Episode>,
    pub(crate) skipped: usize,
}

fn decode_array(raw: &str, what: &str) -> Result<Vec<Value>, FetchError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| FetchError::Decode(err.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(FetchError::Decode(format!("expected a JSON array of {what}"))),
    }
}

/// Decodes an `allepisode` body. Entries that don't decode are counted and
/// dropped instead of failing the whole list.
pub(crate) fn parse_episodes(raw: &str) -> Result<ParsedEpisodes, FetchError> {
    let mut parsed = ParsedEpisodes::default();
    for item in decode_array(raw, "episodes")? {
        match serde_json::from_value::<Episode>(item) {
            Ok(episode) if !episode.chapter_id.trim().is_empty() => parsed.episodes.push(episode),
            _ => parsed.skipped += 1,
        }
    }
    Ok(parsed)
}

#[derive(Debug, Default)]
pub(crate) struct ParsedCards {
    pub(crate) cards: Vec<DramaCard>,
    pub(crate) skipped: usize,
}

/// Decodes a browse or search body. Entries without a usable id are dropped.
pub(crate) fn parse_cards(raw: &str) -> Result<ParsedCards, FetchError> {
    let mut parsed = ParsedCards::default();
    for item in decode_array(raw, "dramas")? {
        match serde_json::from_value::<WireDrama>(item)
            .ok()
            .and_then(WireDrama::into_card)
        {
            Some(card) => parsed.cards.push(card),
            None => parsed.skipped += 1,
        }
    }
    Ok(parsed)
}

pub(crate) fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    if scheme.is_empty() || host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}

#[cfg(test)]
pub(crate) fn episode(id: &str, name: &str, tiers: &[u32]) -> Episode {
    Episode {
        chapter_id: id.to_string(),
        chapter_index: id.parse::<u32>().map(|n| n.saturating_sub(1)).unwrap_or(0),
        chapter_name: name.to_string(),
        chapter_img: None,
        cdn_list: vec![CdnGroup {
            video_path_list: tiers
                .iter()
                .map(|tier| VideoQuality {
                    quality: *tier,
                    video_path: format!("https://cdn.example.test/{id}/{tier}.mp4"),
                })
                .collect(),
        }],
    }
}
