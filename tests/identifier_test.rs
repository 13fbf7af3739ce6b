use workspace_resolver::errors::ResolverError;
use workspace_resolver::identifier::*;

#[test]
fn test_url_with_title_slug_resolves_to_id() {
    let parsed = parse_identifier("https://host/Title-1fb79d4c71bb8032b722c82305b63a00").unwrap();
    assert_eq!(
        parsed,
        ParsedIdentifier::Url("1fb79d4c71bb8032b722c82305b63a00".to_string())
    );
}

#[test]
fn test_host_marker_without_scheme_is_url() {
    let parsed =
        parse_identifier("www.notion.so/acme/Tasks-1FB79D4C71BB8032B722C82305B63A00").unwrap();
    assert_eq!(parsed.id(), Some("1fb79d4c71bb8032b722c82305b63a00"));
}

#[test]
fn test_url_with_trailing_slash_and_query() {
    let parsed =
        parse_identifier("https://www.notion.so/1fb79d4c71bb8032b722c82305b63a00/?pvs=4").unwrap();
    assert_eq!(parsed.id(), Some("1fb79d4c71bb8032b722c82305b63a00"));
}

#[test]
fn test_url_without_id_is_validation_error() {
    let err = parse_identifier("https://www.notion.so/acme/Tasks").unwrap_err();
    match err {
        ResolverError::Validation { input, .. } => {
            assert_eq!(input, "https://www.notion.so/acme/Tasks")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_bare_id_is_normalized() {
    let parsed = parse_identifier("  1FB79D4C-71BB-8032-B722-C82305B63A00 ").unwrap();
    assert_eq!(
        parsed,
        ParsedIdentifier::Id("1fb79d4c71bb8032b722c82305b63a00".to_string())
    );
}

#[test]
fn test_wrong_length_hex_is_validation_error() {
    let err = parse_identifier("1fb79d4c71bb8032b722c82305b63a").unwrap_err();
    assert!(matches!(err, ResolverError::Validation { .. }));
}

#[test]
fn test_empty_input_is_validation_error() {
    assert!(matches!(
        parse_identifier("").unwrap_err(),
        ResolverError::Validation { .. }
    ));
    assert!(matches!(
        parse_identifier("   \t").unwrap_err(),
        ResolverError::Validation { .. }
    ));
}

#[test]
fn test_free_text_is_normalized_name() {
    let parsed = parse_identifier("  Tasks Database ").unwrap();
    assert_eq!(parsed, ParsedIdentifier::Name("tasks database".to_string()));
    assert_eq!(parsed.id(), None);
}

#[test]
fn test_short_hex_word_is_a_name() {
    let parsed = parse_identifier("Cafe").unwrap();
    assert_eq!(parsed, ParsedIdentifier::Name("cafe".to_string()));
}

#[test]
fn test_custom_host_markers() {
    let parser = IdentifierParser::new(vec!["wiki.example.com".to_string()]);
    let parsed = parser
        .parse("wiki.example.com/Roadmap-1fb79d4c71bb8032b722c82305b63a00")
        .unwrap();
    assert!(matches!(parsed, ParsedIdentifier::Url(_)));
}

#[test]
fn test_normalize_id() {
    assert_eq!(
        normalize_id("1FB79D4C-71BB-8032-B722-C82305B63A00"),
        "1fb79d4c71bb8032b722c82305b63a00"
    );
}

#[test]
fn test_url_with_overlong_hex_id_is_validation_error() {
    let err = parse_identifier("https://www.notion.so/Tasks-ab1fb79d4c71bb8032b722c82305b63a00")
        .unwrap_err();
    assert!(matches!(err, ResolverError::Validation { .. }), "got {err:?}");
}
