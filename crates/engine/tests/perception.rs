//! Flattening a captured uiautomator dump end to end.

use engine::perception::{describe, screen_from_xml, FlattenOptions, SuggestedAction};

const DUMP: &str = include_str!("fixtures/window_dump.xml");

#[test]
fn login_screen_default_options() {
    let state = screen_from_xml(DUMP, &FlattenOptions::default()).expect("dump should parse");

    let screen = state.screen.expect("root bounds give the screen size");
    assert_eq!((screen.width, screen.height), (1080, 1920));
    assert_eq!(state.element_count, 5);

    let labels: Vec<_> = state
        .elements
        .iter()
        .map(|e| e.label.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(
        labels,
        vec!["Sign in", "Email", "<password>", "Remember me", "Log in"]
    );

    let email = &state.elements[1];
    assert_eq!(email.action, SuggestedAction::Type);
    assert_eq!(email.center, [540, 460]);
    assert!(email.focused);
    assert_eq!(email.resource_id.as_deref(), Some("com.example.mail:id/email"));

    assert!(state.elements[2].password);
    assert_eq!(state.elements[3].checked, Some(true));
    assert_eq!(state.elements[4].action, SuggestedAction::Tap);
    assert_eq!(state.elements[4].class, "FrameLayout");

    for (i, e) in state.elements.iter().enumerate() {
        assert_eq!(e.index, i);
    }
}

#[test]
fn interactive_only_and_disabled() {
    let opts = FlattenOptions {
        include_text: false,
        include_disabled: true,
    };
    let state = screen_from_xml(DUMP, &opts).unwrap();
    let labels: Vec<_> = state
        .elements
        .iter()
        .map(|e| e.label.clone().unwrap_or_default())
        .collect();
    assert_eq!(
        labels,
        vec!["Email", "<password>", "Remember me", "Log in", "Forgot password?"]
    );
}

#[test]
fn tolerates_leading_noise() {
    let noisy = format!("WARNING: linker: unused DT entry\n{}", DUMP);
    let state = screen_from_xml(&noisy, &FlattenOptions::default()).unwrap();
    assert_eq!(state.element_count, 5);
}

#[test]
fn listing_mentions_every_element() {
    let state = screen_from_xml(DUMP, &FlattenOptions::default()).unwrap();
    let text = describe(&state);
    assert!(text.starts_with("Screen 1080x1920, 5 elements"));
    assert!(text.contains("[1] EditText \"Email\" @ (540, 460) type"));
    assert!(!text.contains("hunter2"));
}
