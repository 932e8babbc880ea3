//! Fuzzy sample-name resolution
//!
//! Logical sound names rarely match sample file names exactly ("Kick - Tekk"
//! vs `kick_tekk_01.wav`), so resolution is tolerant of casing, punctuation
//! and token order. Pure functions over candidate name lists; all I/O stays
//! in the sound bank.

/// File name without its final extension
pub fn stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Lowercased with every non-alphanumeric character removed
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Lowercased tokens split on non-alphanumeric runs, tokens of length <= 1
/// discarded
pub fn tokens(s: &str) -> Vec<String> {
    s.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect()
}

/// Pick the best candidate for `query`, tier by tier:
///
/// 1. exact case-insensitive stem match
/// 2. normalized substring containment, either direction
/// 3. candidate token set is a superset of the query token set
///
/// Within a tier, the first candidate in list order wins. Returns `None`
/// when no tier matches.
pub fn find_match<'a, I>(candidates: I, query: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidates: Vec<&str> = candidates.into_iter().collect();

    if let Some(hit) = candidates
        .iter()
        .copied()
        .find(|c| stem(c).eq_ignore_ascii_case(query))
    {
        return Some(hit);
    }

    let n_query = normalize(query);
    if !n_query.is_empty() {
        if let Some(hit) = candidates.iter().copied().find(|c| {
            let n_name = normalize(stem(c));
            !n_name.is_empty() && (n_name.contains(&n_query) || n_query.contains(&n_name))
        }) {
            return Some(hit);
        }
    }

    let q_tokens = tokens(query);
    if !q_tokens.is_empty() {
        if let Some(hit) = candidates.iter().copied().find(|c| {
            let c_tokens = tokens(stem(c));
            q_tokens.iter().all(|t| c_tokens.contains(t))
        }) {
            return Some(hit);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_strips_final_extension_only() {
        assert_eq!(stem("kick.wav"), "kick");
        assert_eq!(stem("Kick - Tekk.01.flac"), "Kick - Tekk.01");
        assert_eq!(stem("noextension"), "noextension");
        assert_eq!(stem(".hidden"), ".hidden");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Kick - Tekk"), "kicktekk");
        assert_eq!(normalize("audio-volume-change"), "audiovolumechange");
        assert_eq!(normalize("  !!  "), "");
    }

    #[test]
    fn test_tokens_discards_short_tokens() {
        assert_eq!(tokens("Kick - Tekk 1"), vec!["kick", "tekk"]);
        assert_eq!(tokens("a b cd"), vec!["cd"]);
        assert!(tokens("- _ !").is_empty());
    }

    #[test]
    fn test_exact_stem_match_wins_over_later_tiers() {
        let candidates = ["kick_long.wav", "Kick.wav", "kick2.wav"];
        assert_eq!(find_match(candidates, "kick"), Some("Kick.wav"));
    }

    #[test]
    fn test_normalized_containment_both_directions() {
        // candidate contains query
        let candidates = ["snare_og_take3.wav"];
        assert_eq!(find_match(candidates, "Snare - OG"), Some("snare_og_take3.wav"));
        // query contains candidate
        let candidates = ["bell.wav"];
        assert_eq!(find_match(candidates, "big-bell-sound"), Some("bell.wav"));
    }

    #[test]
    fn test_token_set_containment() {
        // Token order differs and the candidate has extras; all query tokens
        // must be present
        let candidates = ["tekk_dark_kick.wav"];
        assert_eq!(find_match(candidates, "Kick ... Tekk"), Some("tekk_dark_kick.wav"));
        assert_eq!(find_match(candidates, "Kick Snare"), None);
    }

    #[test]
    fn test_no_match_returns_none() {
        let candidates = ["kick.wav", "snare.wav"];
        assert_eq!(find_match(candidates, "violin"), None);
        assert_eq!(find_match([], "kick"), None);
    }

    #[test]
    fn test_first_candidate_wins_within_a_tier() {
        let candidates = ["message-new-instant.oga", "message.oga"];
        assert_eq!(
            find_match(candidates, "message"),
            Some("message.oga"),
            "exact stem beats containment"
        );
        let candidates = ["perc_box_a.wav", "perc_box_b.wav"];
        assert_eq!(find_match(candidates, "Perc - Box"), Some("perc_box_a.wav"));
    }
}
