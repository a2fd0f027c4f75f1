//! Unsupported layer detection

use std::collections::HashSet;

/// Layers declared by the network that the device cannot execute.
///
/// Keeps declaration order and drops repeated names.
pub fn unsupported_layers<'a, I>(declared: I, supported: &HashSet<String>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    declared
        .into_iter()
        .filter(|name| !supported.contains(*name))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_supported() {
        let declared = ["conv1", "relu1", "detection_out"];
        let supported = set(&["conv1", "relu1", "detection_out"]);
        assert!(unsupported_layers(declared, &supported).is_empty());
    }

    #[test]
    fn test_difference_keeps_declared_order() {
        let declared = ["input", "PriorBoxClustered_0", "conv", "DetectionOutput"];
        let supported = set(&["input", "conv"]);
        assert_eq!(
            unsupported_layers(declared, &supported),
            vec!["PriorBoxClustered_0".to_string(), "DetectionOutput".to_string()]
        );
    }

    #[test]
    fn test_supported_extras_ignored() {
        let supported = set(&["a", "b", "not_in_network"]);
        assert_eq!(unsupported_layers(["a", "c"], &supported), vec!["c".to_string()]);
    }

    #[test]
    fn test_nothing_supported() {
        let supported = HashSet::new();
        assert_eq!(unsupported_layers(["a", "a", "b"], &supported), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn prop_matches_set_difference(
            declared in proptest::collection::vec("[a-e]{1,2}", 0..20),
            supported in proptest::collection::hash_set("[a-e]{1,2}", 0..10),
        ) {
            let result = unsupported_layers(declared.iter().map(String::as_str), &supported);

            let expected: HashSet<&String> =
                declared.iter().filter(|n| !supported.contains(*n)).collect();
            let got: HashSet<&String> = result.iter().collect();
            prop_assert_eq!(result.len(), expected.len());
            prop_assert_eq!(got, expected);
        }
    }
}
