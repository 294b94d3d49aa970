/// Generate a fixture table name: `<millis>_<0..999>_<label>`.
///
/// Two calls in the same millisecond with the same random draw and label
/// collide; callers needing stronger guarantees pass distinct labels.
pub fn generate_name(label: Option<&str>) -> String {
    format!(
        "{}_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        fastrand::u16(..1000),
        label.unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_name_format() {
        let name = generate_name(Some("orders"));
        let parts: Vec<&str> = name.splitn(3, '_').collect();

        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<i64>().unwrap() > 0);
        assert!(parts[1].parse::<u16>().unwrap() < 1000);
        assert_eq!(parts[2], "orders");
    }

    #[test]
    fn test_name_without_label_ends_with_separator() {
        assert!(generate_name(None).ends_with('_'));
    }

    #[test]
    fn test_names_are_pairwise_distinct() {
        let names: HashSet<String> = (0..10_000)
            .map(|i| generate_name(Some(&i.to_string())))
            .collect();
        assert_eq!(names.len(), 10_000);
    }
}
