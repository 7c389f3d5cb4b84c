const BASE_MATCH: u32 = 1;
const FIRST_MATCH_BONUS: u32 = 10;
const CONTIGUOUS_BONUS: u32 = 5;
const WORD_START_BONUS: u32 = 8;

/// Subsequence score of `query` inside `text`, case-folded. `0` means no match;
/// an empty query matches everything with the lowest score of `1`.
pub fn score(query: &str, text: &str) -> u32 {
    if query.is_empty() {
        return 1;
    }

    let needle: Vec<char> = query.chars().flat_map(|c| c.to_lowercase()).collect();
    let hay: Vec<char> = text.chars().flat_map(|c| c.to_lowercase()).collect();
    if hay.is_empty() {
        return 0;
    }

    let mut total = 0;
    let mut cursor = 0;
    let mut last_match: Option<usize> = None;

    for (index, ch) in hay.iter().enumerate() {
        if cursor == needle.len() {
            break;
        }
        if *ch != needle[cursor] {
            continue;
        }

        let mut current = BASE_MATCH;
        match last_match {
            None => current += FIRST_MATCH_BONUS,
            Some(previous) if previous + 1 == index => current += CONTIGUOUS_BONUS,
            Some(_) => {}
        }
        if index == 0 || hay[index - 1].is_whitespace() {
            current += WORD_START_BONUS;
        }

        total += current;
        last_match = Some(index);
        cursor += 1;
    }

    if cursor == needle.len() {
        total
    } else {
        0
    }
}

/// Scores every candidate against `query`, drops non-matches, orders by descending
/// score and keeps the first `limit`. Ties keep the input order.
pub fn rank_by_score<T, F>(candidates: &[T], query: &str, limit: usize, text_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    if limit == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(u32, usize, &T)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let value = score(query, text_of(candidate));
            (value > 0).then_some((value, index, candidate))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, _, candidate)| candidate.clone())
        .collect()
}
