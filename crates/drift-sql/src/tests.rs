use super::*;

#[test]
fn test_qualified_names() {
    assert_eq!(Qualified(None, "user").to_string(), "\"user\"");
    assert_eq!(Qualified(Some("app"), "user").to_string(), "\"app\".\"user\"");
    assert_eq!(Qualified(Some("we\"ird"), "t").to_string(), "\"we\"\"ird\".\"t\"");
}

#[test]
fn test_default_names() {
    assert_eq!(primary_key_name("user"), "user_pkey");
    assert_eq!(exclude_name("booking", &["room_id", "during"]), "excl_booking_room_id_during");
    assert_eq!(
        foreign_key_name("post_tag", &["post_id", "tag_id"]),
        "post_tag_post_id_tag_id_fkey"
    );
}

#[test]
fn test_long_names_are_truncated() {
    let table = "a".repeat(80);
    assert_eq!(index_name(&table, &["id"]).len(), PG_IDENT_MAX);
    assert_eq!(primary_key_name(&table).len(), PG_IDENT_MAX);
}

#[test]
fn test_check_constraint_name_is_whitespace_insensitive() {
    let a = check_constraint_name("product", "price   >  0");
    let b = check_constraint_name("product", "price > 0");
    assert_eq!(a, b);
    assert!(a.starts_with("ck_product_"));
    assert_ne!(a, check_constraint_name("product", "price >= 0"));
}

#[test]
fn test_normalize_sql_keeps_quoted_whitespace() {
    assert_eq!(normalize_sql("  a  =   'x   y' "), "a = 'x   y'");
    assert_eq!(normalize_sql("\"my  col\"\n IS NULL"), "\"my  col\" IS NULL");
    assert_eq!(normalize_sql("'it''s   ok'"), "'it''s   ok'");
}

#[test]
fn test_strip_outer_parens() {
    assert_eq!(strip_outer_parens("((a = b))"), "a = b");
    assert_eq!(strip_outer_parens("(a) = (b)"), "(a) = (b)");
    assert_eq!(strip_outer_parens("(')')"), "')'");
    assert_eq!(strip_outer_parens("a"), "a");
}

#[test]
fn test_sql_text_eq() {
    assert!(sql_text_eq("(a = b)", "a = b"));
    assert!(sql_text_eq("a  =\n b", "a = b"));
    assert!(!sql_text_eq("a=b", "a = b"));
}

#[test]
fn test_to_snake_case() {
    assert_eq!(to_snake_case("userId"), "user_id");
    assert_eq!(to_snake_case("PostTag"), "post_tag");
    assert_eq!(to_snake_case("version2Name"), "version2_name");
    assert_eq!(to_snake_case("id"), "id");
}
