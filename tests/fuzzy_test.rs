use workspace_resolver::fuzzy::{edit_distance, score};

#[test]
fn test_identical_strings_score_one() {
    for s in ["", "a", "tasks", "tasks database", "Ünïcödé"] {
        assert_eq!(score(s, s), 1.0, "score('{s}', '{s}') should be 1.0");
    }
}

#[test]
fn test_score_is_symmetric() {
    let pairs = [
        ("task", "tasks"),
        ("xyz", "tasks"),
        ("", "abc"),
        ("roadmap", "road map"),
        ("kitten", "sitting"),
    ];
    for (a, b) in pairs {
        assert_eq!(score(a, b), score(b, a), "score not symmetric for '{a}'/'{b}'");
    }
}

#[test]
fn test_close_and_distant_examples() {
    assert!(score("task", "tasks") > 0.7);
    assert!(score("xyz", "tasks") < 0.5);
}

#[test]
fn test_score_bounds() {
    assert_eq!(score("", "abc"), 0.0);
    assert_eq!(score("abc", "xyz"), 0.0);
    let s = score("roadmap", "roadmaps");
    assert!((0.0..=1.0).contains(&s));
}

#[test]
fn test_edit_distance() {
    assert_eq!(edit_distance("task", "tasks"), 1);
    assert_eq!(edit_distance("flaw", "lawn"), 2);
    assert_eq!(edit_distance("", "abc"), 3);
}
