//! Records produced by the crawl
//!
//! `Category` values come out of the taxonomy pass and never change
//! afterwards. A `Recipe` starts as a stub built from a listing href and is
//! enriched once its detail page has been extracted.

use crate::crawler::ExtractError;

/// A node of the site's category taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Unique key, derived from the href
    pub slug: String,

    /// Display name without the embedded recipe count
    pub name: String,

    /// Site-relative link to the category listing
    pub href: String,

    /// Slug of the parent category, None for top-level categories
    pub parent_slug: Option<String>,
}

impl Category {
    /// Returns true for top-level categories
    pub fn is_parent(&self) -> bool {
        self.parent_slug.is_none()
    }
}

/// Optional fields read from a recipe detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFields {
    pub name: String,
    pub cooking_time: String,
    pub description: String,
    pub number_servings: String,
    pub image_src: String,
}

/// A recipe record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Trailing numeric segment of the href
    pub id: u64,
    pub name: String,
    pub cooking_time: String,
    pub description: String,
    pub number_servings: String,
    pub image_src: String,
    pub href: String,
    pub category_slug: String,
}

impl Recipe {
    /// Builds a stub from a listing href
    ///
    /// Fails with `ExtractError::Parse` when the href carries no numeric id.
    pub fn stub(href: &str, category_slug: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            id: recipe_id_from_href(href)?,
            name: String::new(),
            cooking_time: String::new(),
            description: String::new(),
            number_servings: String::new(),
            image_src: String::new(),
            href: href.to_string(),
            category_slug: category_slug.to_string(),
        })
    }

    /// Fills the detail fields in place
    pub fn enrich(&mut self, fields: RecipeFields) {
        self.name = fields.name;
        self.cooking_time = fields.cooking_time;
        self.description = fields.description;
        self.number_servings = fields.number_servings;
        self.image_src = fields.image_src;
    }

    /// Returns true once detail fields have been filled
    pub fn is_enriched(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Derives a recipe id from the trailing numeric segment of an href
///
/// The id is the text after the last `-` of the last path segment; query
/// strings, fragments and trailing slashes are ignored.
///
/// # Examples
///
/// ```
/// use recipe_harvest::model::recipe_id_from_href;
///
/// assert_eq!(recipe_id_from_href("/recepty/supy/borsch-12345").unwrap(), 12345);
/// assert_eq!(recipe_id_from_href("https://eda.ru/recepty/salaty/olivje-77/").unwrap(), 77);
/// assert!(recipe_id_from_href("/recepty/supy").is_err());
/// ```
pub fn recipe_id_from_href(href: &str) -> Result<u64, ExtractError> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let last_segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let tail = match last_segment.rsplit_once('-') {
        Some((_, tail)) => tail,
        None => last_segment,
    };

    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtractError::Parse {
            input: href.to_string(),
            reason: "href has no trailing numeric id".to_string(),
        });
    }

    tail.parse::<u64>().map_err(|e| ExtractError::Parse {
        input: href.to_string(),
        reason: e.to_string(),
    })
}

/// Derives a category slug from its href by removing the configured prefix
///
/// `"/recepty/supy"` with prefix `"/recepty/"` becomes `"supy"`; nested
/// paths keep their inner slashes.
pub fn category_slug(href: &str, prefix: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let trimmed_prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');

    let slug = if trimmed_prefix.is_empty() {
        path
    } else {
        match path.strip_prefix(trimmed_prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => path,
        }
    };

    slug.to_lowercase()
}
