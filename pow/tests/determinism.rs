mod common;

use std::collections::HashSet;

use proptest::prelude::*;
use randomjs_pow::{Key, ProgramFactory, ProgramOptions};

fn deep_options() -> ProgramOptions {
    ProgramOptions {
        max_depth: 20,
        max_block_statements: 3,
        ..ProgramOptions::default()
    }
}

/// Names introduced by `let` anywhere in the program text
fn let_names(text: &str) -> Vec<&str> {
    text.match_indices("let ")
        .map(|(i, _)| {
            let rest = &text[i + 4..];
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_same_key_same_program(seed in any::<u64>()) {
        let factory = common::factory();
        let key = Key::from_seed(seed);
        let a = factory.generate(&key).unwrap();
        let b = factory.generate(&key).unwrap();
        prop_assert_eq!(a.bytes(), b.bytes());
        prop_assert_eq!(a.len(), b.len());
        prop_assert_eq!(a.key(), &key);
    }

    #[test]
    fn prop_independent_factories_agree(seed in any::<u64>()) {
        let key = Key::from_seed(seed);
        let a = common::factory().generate(&key).unwrap();
        let b = ProgramFactory::new(ProgramOptions::default()).unwrap().generate(&key).unwrap();
        prop_assert_eq!(a, b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_names_unique_at_depth_20(seed in any::<u64>()) {
        let factory = ProgramFactory::new(deep_options()).unwrap();
        let key = Key::from_seed(seed);
        let generated = factory.build(&key).unwrap();

        let mut seen = HashSet::new();
        for variable in generated.scopes.variables() {
            prop_assert!(seen.insert(variable.name.clone()), "duplicate {}", variable.name);
        }

        let program = factory.generate(&key).unwrap();
        let mut declared = HashSet::new();
        for name in let_names(program.text()) {
            prop_assert!(declared.insert(name), "redeclared {}", name);
        }
    }
}
