//! Console rendering of the category taxonomy

use crate::model::Category;
use std::fmt::Write;

/// Renders parents in order, each followed by its children prefixed with
/// `" - "`
pub fn render_category_tree(categories: &[Category]) -> String {
    let mut out = String::new();

    for parent in categories.iter().filter(|c| c.is_parent()) {
        let _ = writeln!(out, "{}", parent.name);
        for child in categories
            .iter()
            .filter(|c| c.parent_slug.as_deref() == Some(parent.slug.as_str()))
        {
            let _ = writeln!(out, " - {}", child.name);
        }
    }

    out
}

/// Prints the category tree to stdout
pub fn print_category_tree(categories: &[Category]) {
    println!("=== Categories ({}) ===\n", categories.len());
    print!("{}", render_category_tree(categories));
    println!();
}
