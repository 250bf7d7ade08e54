//! Property-based tests for the lifecycle round trip and blind indexes.

mod support;

use fieldcipher::lifecycle::EntityListener;
use fieldcipher::prelude::*;
use proptest::prelude::*;
use support::{interceptor, Message, User};

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .,!?-]{0,64}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Create followed by load restores the plaintext
    #[test]
    fn create_then_load_restores_plaintext(text in "\\PC{0,128}") {
        let interceptor = interceptor();
        let mut message = Message { id: 1, text: Some(text.clone()), ..Message::default() };

        interceptor.on_before_create(&mut message).unwrap();
        prop_assert_ne!(message.text.as_deref(), Some(text.as_str()));
        interceptor.on_load(&mut message).unwrap();

        prop_assert_eq!(message.text, Some(text));
    }

    /// Sealing the same value twice yields fresh ciphertext but the same token
    #[test]
    fn tokens_are_deterministic(text in text_strategy()) {
        let interceptor = interceptor();
        let mut first = Message { id: 1, text: Some(text.clone()), ..Message::default() };
        let mut second = first.clone();

        interceptor.on_before_create(&mut first).unwrap();
        interceptor.on_before_create(&mut second).unwrap();

        prop_assert_ne!(first.text, second.text);
        prop_assert_eq!(first.text_blind_index_insensitive, second.text_blind_index_insensitive);
    }

    /// Values differing only in case share the case-insensitive token
    #[test]
    fn case_insensitive_index_ignores_case(text in text_strategy()) {
        let interceptor = interceptor();

        let lower = interceptor.blind_index::<Message>("text", "insensitive", &text.to_lowercase()).unwrap();
        let upper = interceptor.blind_index::<Message>("text", "insensitive", &text.to_uppercase()).unwrap();

        prop_assert_eq!(lower, upper);
    }

    /// The last-four token depends only on the trailing characters
    #[test]
    fn last_four_token_ignores_prefix(prefix in "[0-9-]{0,12}", tail in "[0-9]{4}") {
        let interceptor = interceptor();

        let short = interceptor.blind_index::<User>("ssn", "last_four", &tail).unwrap();
        let long = interceptor.blind_index::<User>("ssn", "last_four", &format!("{prefix}{tail}")).unwrap();

        prop_assert_eq!(short, long);
    }

    /// Distinct exact values do not collide on a full-width index
    #[test]
    fn exact_tokens_separate_values(a in text_strategy(), b in text_strategy()) {
        prop_assume!(a != b);
        let interceptor = interceptor();

        let left = interceptor.blind_index::<User>("email", "exact", &a).unwrap();
        let right = interceptor.blind_index::<User>("email", "exact", &b).unwrap();

        prop_assert_ne!(left, right);
    }
}
