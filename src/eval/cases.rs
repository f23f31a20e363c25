//! Chinook-specific test cases for agent evaluation.

/// One evaluation case: a question and the substrings its answer must
/// contain.
#[derive(Debug, Clone, Copy)]
pub struct TestCase {
    /// Stable identifier.
    pub id: &'static str,
    /// The natural-language question.
    pub question: &'static str,
    /// Substrings the final answer must contain (case-insensitive). Empty
    /// means any non-erroring answer passes.
    pub expected_answer_contains: &'static [&'static str],
    /// Category label used for filtering and summary grouping.
    pub category: &'static str,
}

/// The full evaluation corpus.
pub const TEST_CASES: &[TestCase] = &[
    // --- Simple lookups ---
    TestCase {
        id: "simple_001",
        question: "What are all the genres?",
        expected_answer_contains: &["Rock", "Jazz", "Metal"],
        category: "simple",
    },
    TestCase {
        id: "simple_002",
        question: "List all media types.",
        expected_answer_contains: &["MPEG", "AAC"],
        category: "simple",
    },
    TestCase {
        id: "simple_003",
        question: "What are the names of all playlists?",
        expected_answer_contains: &["Music", "Movies"],
        category: "simple",
    },
    TestCase {
        id: "simple_004",
        question: "Show me the first 5 artist names.",
        expected_answer_contains: &["AC/DC"],
        category: "simple",
    },
    // --- Aggregations ---
    TestCase {
        id: "agg_001",
        question: "How many employees are there?",
        expected_answer_contains: &["8"],
        category: "aggregation",
    },
    TestCase {
        id: "agg_002",
        question: "What is the total number of tracks?",
        expected_answer_contains: &["3,503"],
        category: "aggregation",
    },
    TestCase {
        id: "agg_003",
        question: "How many albums are in the database?",
        expected_answer_contains: &["347"],
        category: "aggregation",
    },
    TestCase {
        id: "agg_004",
        question: "What is the total amount of all invoices?",
        expected_answer_contains: &["2328.6"],
        category: "aggregation",
    },
    // --- Joins ---
    TestCase {
        id: "join_001",
        question: "List all albums by AC/DC.",
        expected_answer_contains: &["For Those About To Rock", "Let There Be Rock"],
        category: "join",
    },
    TestCase {
        id: "join_002",
        question: "Which albums did Iron Maiden release?",
        expected_answer_contains: &["Iron Maiden"],
        category: "join",
    },
    // --- Filters ---
    TestCase {
        id: "filter_001",
        question: "Which customers are from Brazil?",
        expected_answer_contains: &["Luís", "Gonçalves"],
        category: "filter",
    },
    TestCase {
        id: "filter_002",
        question: "List employees who were hired after 2002.",
        expected_answer_contains: &["2003", "2004"],
        category: "filter",
    },
    TestCase {
        id: "filter_003",
        question: "Which tracks are longer than 5 minutes?",
        expected_answer_contains: &["300000"],
        category: "filter",
    },
    // --- Complex ---
    TestCase {
        id: "complex_001",
        question: "Who are the top 3 customers by total purchase amount?",
        expected_answer_contains: &["Helena", "Richard", "Luis"],
        category: "complex",
    },
    TestCase {
        id: "complex_002",
        question: "Which artist has the most albums?",
        expected_answer_contains: &["Iron Maiden"],
        category: "complex",
    },
    TestCase {
        id: "complex_003",
        question: "What are the top 5 best-selling tracks by number of times purchased?",
        expected_answer_contains: &["track"],
        category: "complex",
    },
];

/// Cases belonging to the given category.
pub fn filter_by_category<'a>(cases: &'a [TestCase], category: &str) -> Vec<TestCase> {
    cases
        .iter()
        .filter(|c| c.category == category)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_ids_are_unique() {
        let mut ids: Vec<&str> = TEST_CASES.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), TEST_CASES.len());
    }

    #[test]
    fn test_filter_by_category() {
        let joins = filter_by_category(TEST_CASES, "join");
        assert_eq!(joins.len(), 2);
        assert!(joins.iter().all(|c| c.category == "join"));

        assert!(filter_by_category(TEST_CASES, "nonexistent").is_empty());
    }
}
