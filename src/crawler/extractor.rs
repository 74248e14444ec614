//! HTML extraction for the three page types of a recipe site
//!
//! Every function here is pure: it takes a page body and compiled
//! [`Selectors`] and returns records or an [`ExtractError`]. Optional fields
//! that are missing come back as empty strings; a missing *required* anchor
//! is an error so that a changed page layout or an error page is never
//! mistaken for a page without data.

use crate::config::SelectorProfile;
use crate::model::{category_slug, Category, RecipeFields};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors raised while extracting records from a page
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A required anchor element is absent
    #[error("Required element '{selector}' not found")]
    MissingElement { selector: String },

    /// A count or id could not be parsed
    #[error("Cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Invalid selector {0}")]
    InvalidSelector(String),
}

/// Compiled form of a [`SelectorProfile`]
#[derive(Debug, Clone)]
pub struct Selectors {
    profile: SelectorProfile,
    category_prefix: String,
    category_root: Selector,
    category_group: Selector,
    parent_link: Selector,
    parent_name: Selector,
    parent_count: Selector,
    child_item: Selector,
    child_link: Selector,
    child_name: Selector,
    child_count: Selector,
    listing_count: Selector,
    listing_card: Selector,
    listing_link: Selector,
    recipe_header: Selector,
    recipe_title: Selector,
    recipe_cooking_time: Selector,
    recipe_servings: Selector,
    recipe_description: Selector,
    recipe_image: Selector,
}

impl Selectors {
    /// Compiles every selector of the profile
    ///
    /// The category prefix defaults to `/recepty/`; override it with
    /// [`Selectors::with_category_prefix`].
    pub fn compile(profile: &SelectorProfile) -> Result<Self, ConfigError> {
        let compile = |name: &str, source: &str| {
            parse_selector(name, source).map_err(|e| match e {
                ExtractError::InvalidSelector(message) => ConfigError::InvalidSelector(message),
                other => ConfigError::InvalidSelector(other.to_string()),
            })
        };

        Ok(Self {
            profile: profile.clone(),
            category_prefix: "/recepty/".to_string(),
            category_root: compile("category-root", &profile.category_root)?,
            category_group: compile("category-group", &profile.category_group)?,
            parent_link: compile("parent-link", &profile.parent_link)?,
            parent_name: compile("parent-name", &profile.parent_name)?,
            parent_count: compile("parent-count", &profile.parent_count)?,
            child_item: compile("child-item", &profile.child_item)?,
            child_link: compile("child-link", &profile.child_link)?,
            child_name: compile("child-name", &profile.child_name)?,
            child_count: compile("child-count", &profile.child_count)?,
            listing_count: compile("listing-count", &profile.listing_count)?,
            listing_card: compile("listing-card", &profile.listing_card)?,
            listing_link: compile("listing-link", &profile.listing_link)?,
            recipe_header: compile("recipe-header", &profile.recipe_header)?,
            recipe_title: compile("recipe-title", &profile.recipe_title)?,
            recipe_cooking_time: compile("recipe-cooking-time", &profile.recipe_cooking_time)?,
            recipe_servings: compile("recipe-servings", &profile.recipe_servings)?,
            recipe_description: compile("recipe-description", &profile.recipe_description)?,
            recipe_image: compile("recipe-image", &profile.recipe_image)?,
        })
    }

    /// Sets the href prefix removed from category links to form slugs
    pub fn with_category_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.category_prefix = prefix.into();
        self
    }

    pub fn profile(&self) -> &SelectorProfile {
        &self.profile
    }
}

fn parse_selector(name: &str, source: &str) -> Result<Selector, ExtractError> {
    Selector::parse(source)
        .map_err(|e| ExtractError::InvalidSelector(format!("{} '{}': {}", name, source, e)))
}

/// Recipe count and recipe links read from one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingExtract {
    /// Total announced by the count element
    pub total: u32,
    /// Recipe hrefs in document order, without duplicates
    pub recipe_hrefs: Vec<String>,
}

/// Extracts the two-level category taxonomy
///
/// # Extraction Passes
///
/// 1. For each category group under the root, read the parent link and
///    record the parent under the group's index.
/// 2. For each child item of each group, build the child and reference its
///    parent through that index.
///
/// Children of a group without a parent link are dropped. When two
/// categories share a slug the first one wins, parents before children.
///
/// # Errors
///
/// `ExtractError::MissingElement` when the taxonomy root is absent.
pub fn extract_categories(html: &str, selectors: &Selectors) -> Result<Vec<Category>, ExtractError> {
    let document = Html::parse_document(html);

    let root = document
        .select(&selectors.category_root)
        .next()
        .ok_or_else(|| ExtractError::MissingElement {
            selector: selectors.profile.category_root.clone(),
        })?;

    let groups: Vec<ElementRef> = root.select(&selectors.category_group).collect();

    // Pass 1: parents keyed by group index
    let mut parents: BTreeMap<usize, Category> = BTreeMap::new();
    for (index, group) in groups.iter().enumerate() {
        if let Some(parent) = extract_parent(group, selectors) {
            parents.insert(index, parent);
        }
    }

    // Pass 2: children referencing their group's parent
    let mut children: Vec<Category> = Vec::new();
    for (index, group) in groups.iter().enumerate() {
        let Some(parent) = parents.get(&index) else {
            continue;
        };

        for item in group.select(&selectors.child_item) {
            let Some(href) = first_href(&item, &selectors.child_link) else {
                continue;
            };

            let slug = category_slug(href, &selectors.category_prefix);
            if slug.is_empty() {
                continue;
            }

            let name = name_without_count(&item, &selectors.child_name, &selectors.child_count);

            children.push(Category {
                slug,
                name,
                href: href.to_string(),
                parent_slug: Some(parent.slug.clone()),
            });
        }
    }

    let mut seen = HashSet::new();
    let categories = parents
        .into_values()
        .chain(children)
        .filter(|category| seen.insert(category.slug.clone()))
        .collect();

    Ok(categories)
}

/// Reads the parent category of one group, skipping links that belong to
/// child items
fn extract_parent(group: &ElementRef, selectors: &Selectors) -> Option<Category> {
    let child_links: HashSet<_> = group
        .select(&selectors.child_item)
        .flat_map(|item| item.select(&selectors.child_link).map(|link| link.id()).collect::<Vec<_>>())
        .collect();

    let link = group
        .select(&selectors.parent_link)
        .find(|link| !child_links.contains(&link.id()))?;

    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }

    let slug = category_slug(href, &selectors.category_prefix);
    if slug.is_empty() {
        return None;
    }

    let name = name_without_count(group, &selectors.parent_name, &selectors.parent_count);

    Some(Category {
        slug,
        name,
        href: href.to_string(),
        parent_slug: None,
    })
}

/// Extracts the announced total and the recipe links of a listing page
///
/// # Errors
///
/// - `ExtractError::MissingElement` when the count element is absent
/// - `ExtractError::Parse` when the count text is not a number
pub fn extract_listing_page(html: &str, selectors: &Selectors) -> Result<ListingExtract, ExtractError> {
    let document = Html::parse_document(html);

    let count_element = document
        .select(&selectors.listing_count)
        .next()
        .ok_or_else(|| ExtractError::MissingElement {
            selector: selectors.profile.listing_count.clone(),
        })?;

    let total = parse_recipe_count(&element_text(&count_element), &selectors.profile.count_tokens)?;

    let mut seen = HashSet::new();
    let recipe_hrefs = document
        .select(&selectors.listing_card)
        .filter_map(|card| first_href(&card, &selectors.listing_link))
        .filter(|href| seen.insert(href.to_string()))
        .map(str::to_string)
        .collect();

    Ok(ListingExtract { total, recipe_hrefs })
}

/// Extracts the detail fields of a recipe page
///
/// The header and a non-empty title are required; cooking time, servings,
/// description and image are optional.
pub fn extract_recipe_detail(html: &str, selectors: &Selectors) -> Result<RecipeFields, ExtractError> {
    let document = Html::parse_document(html);

    let header = document
        .select(&selectors.recipe_header)
        .next()
        .ok_or_else(|| ExtractError::MissingElement {
            selector: selectors.profile.recipe_header.clone(),
        })?;

    let name = first_text(&header, &selectors.recipe_title);
    if name.is_empty() {
        return Err(ExtractError::MissingElement {
            selector: selectors.profile.recipe_title.clone(),
        });
    }

    let description = document
        .select(&selectors.recipe_description)
        .next()
        .map(|element| element_text(&element))
        .unwrap_or_default();

    let image_src = document
        .select(&selectors.recipe_image)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    Ok(RecipeFields {
        name,
        cooking_time: first_text(&header, &selectors.recipe_cooking_time),
        description,
        number_servings: first_text(&header, &selectors.recipe_servings),
        image_src,
    })
}

/// Parses a localized recipe count such as `"Найдено 1 234 рецепта"`
///
/// Whitespace variants (non-breaking and thin spaces included) are folded to
/// plain spaces, the tokens are removed in order, and whatever whitespace
/// remains (digit-group separators) is dropped. The rest must be a
/// non-negative integer.
///
/// # Examples
///
/// ```
/// use recipe_harvest::crawler::parse_recipe_count;
///
/// let tokens = vec!["Найдено ".to_string(), " рецепта".to_string()];
/// assert_eq!(parse_recipe_count("Найдено 42 рецепта", &tokens).unwrap(), 42);
/// assert!(parse_recipe_count("Найдено много рецепта", &tokens).is_err());
/// ```
pub fn parse_recipe_count(text: &str, tokens: &[String]) -> Result<u32, ExtractError> {
    let mut normalized: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    for token in tokens {
        normalized = normalized.replace(token.as_str(), "");
    }

    let digits: String = normalized.chars().filter(|c| !c.is_whitespace()).collect();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtractError::Parse {
            input: text.to_string(),
            reason: "not a non-negative integer".to_string(),
        });
    }

    digits.parse::<u32>().map_err(|e| ExtractError::Parse {
        input: text.to_string(),
        reason: e.to_string(),
    })
}

/// Returns the trimmed text of an element
fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Returns the trimmed text of the first match, or an empty string
fn first_text(scope: &ElementRef, selector: &Selector) -> String {
    scope
        .select(selector)
        .next()
        .map(|element| element_text(&element))
        .unwrap_or_default()
}

/// Returns the first non-empty href under `scope`
fn first_href<'a>(scope: &ElementRef<'a>, selector: &Selector) -> Option<&'a str> {
    scope
        .select(selector)
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
}

/// Reads a name and removes the embedded count text from it
fn name_without_count(scope: &ElementRef, name: &Selector, count: &Selector) -> String {
    let name = first_text(scope, name);
    let count = first_text(scope, count);

    if count.is_empty() {
        name
    } else {
        name.replace(&count, "").trim().to_string()
    }
}
