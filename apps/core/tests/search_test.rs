use kestrel_core::search::{rank_by_score, score};

#[test]
fn every_subsequence_scores_positive() {
    let text = "gnome system monitor";
    for query in ["g", "gsm", "system", "monitor", "gnome s m", "GSM"] {
        assert!(score(query, text) > 0, "{query} should match {text}");
    }
}

#[test]
fn out_of_order_characters_do_not_match() {
    assert_eq!(score("mg", "gm"), 0);
    assert_eq!(score("firefoxx", "firefox"), 0);
}

#[test]
fn contiguous_beats_scattered() {
    assert!(score("term", "terminal") > score("term", "the extra rm"));
}

#[test]
fn scoring_is_deterministic() {
    let first = score("code", "Visual Studio Code");
    for _ in 0..10 {
        assert_eq!(score("code", "Visual Studio Code"), first);
    }
}

#[test]
fn ranks_descending_and_truncates() {
    let names = vec![
        "Xterm".to_string(),
        "Terminal".to_string(),
        "Settings".to_string(),
        "GNOME Terminal".to_string(),
    ];
    let ranked = rank_by_score(&names, "term", 2, |n| n.as_str());
    assert_eq!(ranked, vec!["Terminal".to_string(), "GNOME Terminal".to_string()]);
}

#[test]
fn empty_query_keeps_input_order() {
    let names = vec!["b", "a", "c"];
    assert_eq!(rank_by_score(&names, "", 8, |n| *n), vec!["b", "a", "c"]);
}
