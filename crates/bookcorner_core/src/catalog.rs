//! crates/bookcorner_core/src/catalog.rs
//!
//! The catalog filter engine: predicate-based narrowing of the immutable
//! book set, plus the "blind box" uniform random pick.
//!
//! All dimensions compose by logical AND over the original dataset order;
//! filtering never fails and an empty result is a valid outcome.

use rand::Rng;
use serde::Deserialize;

use crate::domain::{BookRecord, Category};

/// Default upper bound of the ATOS range filter, the top of the observed domain.
pub const ATOS_MAX: f64 = 12.0;

/// Category filter labels. `All` passes every row through, including rows
/// whose source label was unrecognizable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Fiction,
    Nonfiction,
}

impl CategoryFilter {
    fn matches(&self, category: Option<Category>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Fiction => category == Some(Category::Fiction),
            CategoryFilter::Nonfiction => category == Some(Category::Nonfiction),
        }
    }
}

/// One set of filter criteria. Every field at its default is a pass-through,
/// so `BookFilter::default()` is the identity filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookFilter {
    /// Case-insensitive substring over the concatenation of all fields.
    pub fuzzy: String,
    pub title: String,
    pub author: String,
    pub topic: String,
    pub series: String,
    pub quiz_id: String,
    pub category: CategoryFilter,
    /// Exact interest-level label; "ALL" passes everything.
    pub interest_level: String,
    pub atos_min: f64,
    pub atos_max: f64,
    pub min_words: u32,
}

impl Default for BookFilter {
    fn default() -> Self {
        BookFilter {
            fuzzy: String::new(),
            title: String::new(),
            author: String::new(),
            topic: String::new(),
            series: String::new(),
            quiz_id: String::new(),
            category: CategoryFilter::All,
            interest_level: "ALL".to_string(),
            atos_min: 0.0,
            atos_max: ATOS_MAX,
            min_words: 0,
        }
    }
}

fn field_matches(needle: &str, haystack: &str) -> bool {
    needle.trim().is_empty()
        || haystack
            .to_lowercase()
            .contains(&needle.trim().to_lowercase())
}

impl BookFilter {
    /// Whether one record passes every dimension of this filter.
    pub fn matches(&self, book: &BookRecord) -> bool {
        // Fuzzy search narrows first, the per-field predicates then AND on top.
        if !self.fuzzy.trim().is_empty()
            && !book
                .searchable_text()
                .contains(&self.fuzzy.trim().to_lowercase())
        {
            return false;
        }
        if !field_matches(&self.title, &book.title) {
            return false;
        }
        if !field_matches(&self.author, &book.author) {
            return false;
        }
        if !field_matches(&self.topic, &book.topic) {
            return false;
        }
        if !field_matches(&self.series, &book.series) {
            return false;
        }
        if !field_matches(&self.quiz_id, &book.quiz_id) {
            return false;
        }
        if !self.category.matches(book.category) {
            return false;
        }
        if self.interest_level != "ALL" && book.interest_level != self.interest_level {
            return false;
        }
        if book.atos_level < self.atos_min || book.atos_level > self.atos_max {
            return false;
        }
        if book.word_count < self.min_words {
            return false;
        }
        true
    }

    /// Returns the matching subset in original dataset order.
    pub fn apply<'a>(&self, books: &'a [BookRecord]) -> Vec<&'a BookRecord> {
        books.iter().filter(|b| self.matches(b)).collect()
    }
}

/// Distinct interest-level labels present in the data, in first-seen order,
/// for populating the level filter choices.
pub fn distinct_interest_levels(books: &[BookRecord]) -> Vec<String> {
    let mut seen = Vec::new();
    for book in books {
        if !book.interest_level.is_empty() && !seen.contains(&book.interest_level) {
            seen.push(book.interest_level.clone());
        }
    }
    seen
}

/// The "blind box": one uniform sample from the filtered set. When the
/// filter matches nothing it falls back to the whole catalog, so the box
/// only comes up empty on an empty catalog. "Pick again" is simply another
/// call with a fresh draw.
pub fn pick_random<'a, R: Rng>(
    books: &'a [BookRecord],
    filter: &BookFilter,
    rng: &mut R,
) -> Option<&'a BookRecord> {
    let matched = filter.apply(books);
    let pool: Vec<&BookRecord> = if matched.is_empty() {
        books.iter().collect()
    } else {
        matched
    };
    if pool.is_empty() {
        return None;
    }
    let idx = rng.gen_range(0..pool.len());
    Some(pool[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, author: &str, level: &str, atos: f64, words: u32) -> BookRecord {
        BookRecord {
            title: title.to_string(),
            author: author.to_string(),
            interest_level: level.to_string(),
            atos_level: atos,
            quiz_id: format!("q-{title}"),
            word_count: words,
            category: Some(Category::Fiction),
            topic: "animals".to_string(),
            series: String::new(),
            recommender: "Ms. Lin".to_string(),
            rationale_en: "a classic".to_string(),
            rationale_zh: String::new(),
        }
    }

    fn dataset() -> Vec<BookRecord> {
        vec![
            book("The Mitten", "Jan Brett", "LG", 2.1, 450),
            book("Charlotte's Web", "E. B. White", "MG", 4.4, 31938),
            book("Owl Moon", "Jane Yolen", "LG", 3.2, 774),
        ]
    }

    #[test]
    fn default_filter_is_identity() {
        let books = dataset();
        let out = BookFilter::default().apply(&books);
        assert_eq!(out.len(), books.len());
        for (got, want) in out.iter().zip(books.iter()) {
            assert_eq!(got.title, want.title);
        }
    }

    #[test]
    fn result_is_ordered_subset() {
        let books = dataset();
        let filter = BookFilter {
            interest_level: "LG".to_string(),
            ..BookFilter::default()
        };
        let out = filter.apply(&books);
        assert_eq!(out.len(), 2);
        // Original relative order survives.
        assert_eq!(out[0].title, "The Mitten");
        assert_eq!(out[1].title, "Owl Moon");
    }

    #[test]
    fn word_count_bound_is_inclusive() {
        let books = dataset();
        let mut filter = BookFilter {
            min_words: 500,
            ..BookFilter::default()
        };
        assert!(!filter.apply(&books).iter().any(|b| b.title == "The Mitten"));

        filter.min_words = 400;
        assert!(filter.apply(&books).iter().any(|b| b.title == "The Mitten"));

        filter.min_words = 450;
        assert!(filter.apply(&books).iter().any(|b| b.title == "The Mitten"));
    }

    #[test]
    fn fuzzy_search_spans_all_fields() {
        let books = dataset();
        // Matches the recommender column, not any title.
        let filter = BookFilter {
            fuzzy: "ms. lin".to_string(),
            ..BookFilter::default()
        };
        assert_eq!(filter.apply(&books).len(), 3);

        let filter = BookFilter {
            fuzzy: "charlotte".to_string(),
            ..BookFilter::default()
        };
        let out = filter.apply(&books);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Charlotte's Web");
    }

    #[test]
    fn substring_filters_are_case_insensitive() {
        let books = dataset();
        let filter = BookFilter {
            author: "JAN BRETT".to_string(),
            ..BookFilter::default()
        };
        let out = filter.apply(&books);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "The Mitten");
    }

    #[test]
    fn atos_range_is_double_ended_and_inclusive() {
        let books = dataset();
        let filter = BookFilter {
            atos_min: 2.1,
            atos_max: 3.2,
            ..BookFilter::default()
        };
        let out = filter.apply(&books);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "The Mitten");
        assert_eq!(out[1].title, "Owl Moon");
    }

    #[test]
    fn category_filter_excludes_unlabeled_rows() {
        let mut books = dataset();
        books[0].category = None;
        let filter = BookFilter {
            category: CategoryFilter::Fiction,
            ..BookFilter::default()
        };
        assert_eq!(filter.apply(&books).len(), 2);

        // "All" still passes the unlabeled row.
        assert_eq!(BookFilter::default().apply(&books).len(), 3);
    }

    #[test]
    fn filters_compose_by_and() {
        let books = dataset();
        let filter = BookFilter {
            interest_level: "LG".to_string(),
            min_words: 500,
            ..BookFilter::default()
        };
        let out = filter.apply(&books);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Owl Moon");
    }

    #[test]
    fn distinct_levels_in_first_seen_order() {
        let books = dataset();
        assert_eq!(distinct_interest_levels(&books), vec!["LG", "MG"]);
    }

    #[test]
    fn blind_box_draws_from_filtered_set() {
        let books = dataset();
        let filter = BookFilter {
            interest_level: "MG".to_string(),
            ..BookFilter::default()
        };
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let pick = pick_random(&books, &filter, &mut rng).unwrap();
            assert_eq!(pick.title, "Charlotte's Web");
        }
    }

    #[test]
    fn blind_box_falls_back_to_full_catalog() {
        let books = dataset();
        let filter = BookFilter {
            title: "no such book".to_string(),
            ..BookFilter::default()
        };
        let mut rng = rand::thread_rng();
        assert!(pick_random(&books, &filter, &mut rng).is_some());
    }

    #[test]
    fn blind_box_on_empty_catalog_is_none() {
        let mut rng = rand::thread_rng();
        assert!(pick_random(&[], &BookFilter::default(), &mut rng).is_none());
    }
}
