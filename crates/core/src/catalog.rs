//! Category tree, slugs and SKUs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CategoryId;

/// Deepest level a category may sit at (roots are level 0).
pub const MAX_CATEGORY_LEVEL: i16 = 3;

/// Errors from catalog rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("categories can be nested at most {MAX_CATEGORY_LEVEL} levels deep")]
    TooDeep,
    #[error("a category cannot be its own parent")]
    SelfParent,
    #[error("moving the category there would create a cycle")]
    Cycle,
    #[error("slug cannot be empty")]
    EmptySlug,
    #[error("sku must be 3-64 characters of A-Z, 0-9, '-' or '_'")]
    InvalidSku,
}

/// A category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub level: i16,
    pub position: i32,
    pub is_active: bool,
}

/// A category with its children, for the storefront menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Level for a category placed under a parent at `parent_level`.
///
/// # Errors
///
/// Returns [`CatalogError::TooDeep`] past [`MAX_CATEGORY_LEVEL`].
pub fn category_level(parent_level: Option<i16>) -> Result<i16, CatalogError> {
    let level = parent_level.map_or(0, |l| l + 1);
    if level > MAX_CATEGORY_LEVEL {
        return Err(CatalogError::TooDeep);
    }
    Ok(level)
}

/// Check that `category` may be moved under `new_parent`.
///
/// `new_parent_ancestors` lists the ids from `new_parent`'s parent up to the root.
/// `subtree_depth` is how many levels hang below `category` (0 for a leaf), so the
/// whole subtree still fits once it is shifted.
///
/// # Errors
///
/// Returns [`CatalogError::SelfParent`], [`CatalogError::Cycle`] or
/// [`CatalogError::TooDeep`].
pub fn validate_reparent(
    category: CategoryId,
    new_parent: Option<(CategoryId, i16)>,
    new_parent_ancestors: &[CategoryId],
    subtree_depth: i16,
) -> Result<i16, CatalogError> {
    let Some((parent_id, parent_level)) = new_parent else {
        return if subtree_depth > MAX_CATEGORY_LEVEL {
            Err(CatalogError::TooDeep)
        } else {
            Ok(0)
        };
    };
    if parent_id == category {
        return Err(CatalogError::SelfParent);
    }
    if new_parent_ancestors.contains(&category) {
        return Err(CatalogError::Cycle);
    }
    let level = category_level(Some(parent_level))?;
    if level + subtree_depth > MAX_CATEGORY_LEVEL {
        return Err(CatalogError::TooDeep);
    }
    Ok(level)
}

/// Nest a flat category list. Children are ordered by `(position, name)`;
/// categories whose parent is missing from the list become roots.
#[must_use]
pub fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    fn attach(
        parent: Option<CategoryId>,
        by_parent: &mut HashMap<Option<CategoryId>, Vec<Category>>,
    ) -> Vec<CategoryNode> {
        let mut children = by_parent.remove(&parent).unwrap_or_default();
        children.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        children
            .into_iter()
            .map(|category| {
                let id = category.id;
                CategoryNode {
                    category,
                    children: attach(Some(id), by_parent),
                }
            })
            .collect()
    }

    let known: std::collections::HashSet<CategoryId> =
        categories.iter().map(|c| c.id).collect();

    let mut by_parent: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();
    for category in categories {
        let key = category.parent_id.filter(|p| known.contains(p));
        by_parent.entry(key).or_default().push(category);
    }

    attach(None, &mut by_parent)
}

/// Turn a display name into a URL slug.
///
/// Spanish accents are folded, everything that is not ASCII alphanumeric collapses
/// to a single `-`.
///
/// ```
/// use andes_core::catalog::slugify;
///
/// assert_eq!(slugify("Café de Grano — Orgánico"), "cafe-de-grano-organico");
/// assert_eq!(slugify("Niños & Niñas"), "ninos-ninas");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        };
        if folded.is_ascii_alphanumeric() {
            slug.push(folded);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Validate a caller-supplied slug, or derive one from `name`.
///
/// # Errors
///
/// Returns [`CatalogError::EmptySlug`] when nothing usable remains.
pub fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<String, CatalogError> {
    let slug = slugify(explicit.unwrap_or(name));
    if slug.is_empty() {
        return Err(CatalogError::EmptySlug);
    }
    Ok(slug)
}

/// Uppercase and validate a SKU.
///
/// # Errors
///
/// Returns [`CatalogError::InvalidSku`] on bad length or characters.
pub fn normalize_sku(sku: &str) -> Result<String, CatalogError> {
    let sku = sku.trim().to_ascii_uppercase();
    let valid_chars = sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !(3..=64).contains(&sku.len()) || !valid_chars {
        return Err(CatalogError::InvalidSku);
    }
    Ok(sku)
}
