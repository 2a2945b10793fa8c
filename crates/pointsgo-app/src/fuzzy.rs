// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Ranked approximate matching for table search.
//!
//! Tiers, best first: exact (case-sensitive), equal, starts with, a word
//! starts with, contains, acronym, then an in-order character match scored
//! by how tightly the characters cluster. Anything at or above the in-order
//! tier passes.

pub const CASE_SENSITIVE_EQUAL: f64 = 7.0;
pub const EQUAL: f64 = 6.0;
pub const STARTS_WITH: f64 = 5.0;
pub const WORD_STARTS_WITH: f64 = 4.0;
pub const CONTAINS: f64 = 3.0;
pub const ACRONYM: f64 = 2.0;
pub const MATCHES: f64 = 1.0;
pub const NO_MATCH: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyRank {
    pub rank: f64,
    pub passed: bool,
}

pub fn rank_item(candidate: &str, query: &str) -> FuzzyRank {
    let rank = match_ranking(candidate, query);
    FuzzyRank {
        rank,
        passed: rank >= MATCHES,
    }
}

pub fn fuzzy_matches(candidate: &str, query: &str) -> bool {
    rank_item(candidate, query).passed
}

fn match_ranking(candidate: &str, query: &str) -> f64 {
    if query.chars().count() > candidate.chars().count() {
        return NO_MATCH;
    }
    if candidate == query {
        return CASE_SENSITIVE_EQUAL;
    }

    let candidate = candidate.to_lowercase();
    let query = query.to_lowercase();
    if candidate == query {
        return EQUAL;
    }
    if candidate.starts_with(&query) {
        return STARTS_WITH;
    }
    if candidate.contains(&format!(" {query}")) {
        return WORD_STARTS_WITH;
    }
    if candidate.contains(&query) {
        return CONTAINS;
    }
    if query.chars().count() == 1 {
        return NO_MATCH;
    }
    if acronym(&candidate).contains(&query) {
        return ACRONYM;
    }
    closeness_ranking(&candidate, &query)
}

fn acronym(value: &str) -> String {
    value
        .split(' ')
        .flat_map(|word| word.split('-'))
        .filter_map(|part| part.chars().next())
        .collect()
}

fn closeness_ranking(candidate: &str, query: &str) -> f64 {
    let haystack: Vec<char> = candidate.chars().collect();
    let needle: Vec<char> = query.chars().collect();
    let Some((&first, rest)) = needle.split_first() else {
        return NO_MATCH;
    };

    let Some(first_index) = find_from(&haystack, first, 0) else {
        return NO_MATCH;
    };
    let mut last_index = first_index;
    for &ch in rest {
        let Some(index) = find_from(&haystack, ch, last_index + 1) else {
            return NO_MATCH;
        };
        last_index = index;
    }

    let spread = (last_index - first_index).max(1) as f64;
    MATCHES + 1.0 / spread
}

fn find_from(haystack: &[char], target: char, from: usize) -> Option<usize> {
    haystack
        .iter()
        .skip(from)
        .position(|ch| *ch == target)
        .map(|offset| offset + from)
}
