use serde::Deserialize;

/// Main configuration structure for Recipe-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorProfile,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers draining the frontier
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "min-request-delay-ms", default = "default_min_request_delay_ms")]
    pub min_request_delay_ms: u64,

    /// Attempts a frontier item gets before it is dead-lettered
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retries the HTTP fetcher makes for a transient failure within one attempt
    #[serde(rename = "max-fetch-retries", default = "default_max_fetch_retries")]
    pub max_fetch_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Share of dead-lettered items above which the run fails
    #[serde(rename = "failure-rate-threshold", default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,

    /// Finished items required before the failure rate is evaluated
    #[serde(rename = "failure-rate-min-samples", default = "default_failure_rate_min_samples")]
    pub failure_rate_min_samples: u32,

    /// Hard cap on listing pages per category
    #[serde(rename = "max-listing-pages", default = "default_max_listing_pages")]
    pub max_listing_pages: u32,

    /// Whether parent categories get their own listing crawl
    #[serde(rename = "crawl-parent-categories", default = "default_true")]
    pub crawl_parent_categories: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            min_request_delay_ms: default_min_request_delay_ms(),
            max_attempts: default_max_attempts(),
            max_fetch_retries: default_max_fetch_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            failure_rate_threshold: default_failure_rate_threshold(),
            failure_rate_min_samples: default_failure_rate_min_samples(),
            max_listing_pages: default_max_listing_pages(),
            crawl_parent_categories: true,
        }
    }
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site root, used to resolve relative hrefs
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the page that carries the category taxonomy
    #[serde(rename = "taxonomy-path", default = "default_taxonomy_path")]
    pub taxonomy_path: String,

    /// Href prefix stripped from category links to form slugs
    #[serde(rename = "category-prefix", default = "default_category_prefix")]
    pub category_prefix: String,

    /// Domains the fetcher may contact (e.g., "eda.ru" or "*.eda.ru")
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// CSS selectors describing the three page types of the target site
///
/// Defaults match the markup of eda.ru.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorProfile {
    /// Required anchor of the taxonomy page
    #[serde(rename = "category-root")]
    pub category_root: String,

    /// One block per top-level category, inside the root
    #[serde(rename = "category-group")]
    pub category_group: String,

    /// Parent link inside a group
    #[serde(rename = "parent-link")]
    pub parent_link: String,

    /// Parent name, relative to the group
    #[serde(rename = "parent-name")]
    pub parent_name: String,

    /// Recipe count embedded in the parent name
    #[serde(rename = "parent-count")]
    pub parent_count: String,

    /// Child category item inside a group
    #[serde(rename = "child-item")]
    pub child_item: String,

    /// Child link, relative to the item
    #[serde(rename = "child-link")]
    pub child_link: String,

    /// Child name, relative to the item
    #[serde(rename = "child-name")]
    pub child_name: String,

    /// Recipe count embedded in the child name
    #[serde(rename = "child-count")]
    pub child_count: String,

    /// Required anchor of a listing page carrying the total count
    #[serde(rename = "listing-count")]
    pub listing_count: String,

    /// One card per recipe on a listing page
    #[serde(rename = "listing-card")]
    pub listing_card: String,

    /// Link inside a recipe card
    #[serde(rename = "listing-link")]
    pub listing_link: String,

    /// Tokens stripped from the count text before integer parsing
    #[serde(rename = "count-tokens")]
    pub count_tokens: Vec<String>,

    /// Required anchor of a recipe page
    #[serde(rename = "recipe-header")]
    pub recipe_header: String,

    /// Recipe title, relative to the header
    #[serde(rename = "recipe-title")]
    pub recipe_title: String,

    /// Cooking time, relative to the header
    #[serde(rename = "recipe-cooking-time")]
    pub recipe_cooking_time: String,

    /// Number of servings, relative to the header
    #[serde(rename = "recipe-servings")]
    pub recipe_servings: String,

    /// Recipe description
    #[serde(rename = "recipe-description")]
    pub recipe_description: String,

    /// Element carrying the image URL in its `content` attribute
    #[serde(rename = "recipe-image")]
    pub recipe_image: String,
}

impl Default for SelectorProfile {
    fn default() -> Self {
        Self {
            category_root: ".emotion-18mh8uc".to_string(),
            category_group: ".emotion-w5dos9".to_string(),
            parent_link: "a[href]".to_string(),
            parent_name: "a h3".to_string(),
            parent_count: "a h3 span".to_string(),
            child_item: ".emotion-8asrz1".to_string(),
            child_link: "a[href]".to_string(),
            child_name: "a span".to_string(),
            child_count: "a span span".to_string(),
            listing_count: ".emotion-1jdotsv".to_string(),
            listing_card: ".emotion-1eugp2w".to_string(),
            listing_link: "a[href]".to_string(),
            count_tokens: [
                "Найдено ",
                "Найдены ",
                "Найден ",
                " рецептов",
                " рецепта",
                " рецепт",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            recipe_header: ".emotion-19rdt1j".to_string(),
            recipe_title: "h1".to_string(),
            recipe_cooking_time: ".emotion-my9yfq".to_string(),
            recipe_servings: "span[itemprop=recipeYield]".to_string(),
            recipe_description: ".emotion-aiknw3".to_string(),
            recipe_image: "span[itemprop=resultPhoto]".to_string(),
        }
    }
}

fn default_workers() -> u32 {
    4
}

fn default_min_request_delay_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_fetch_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_failure_rate_threshold() -> f64 {
    0.5
}

fn default_failure_rate_min_samples() -> u32 {
    20
}

fn default_max_listing_pages() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

fn default_taxonomy_path() -> String {
    "/".to_string()
}

fn default_category_prefix() -> String {
    "/recepty/".to_string()
}
