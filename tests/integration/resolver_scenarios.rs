//! Resolution scenarios against the default command table.

use hark::similarity::{Metric, best_score, score};
use hark::voice_command::{ActionDescriptor, ActionKind, MatchTier};
use hark::{CommandResolver, CommandTable, Resolution};

fn resolve(text: &str) -> Resolution {
    CommandResolver::default().resolve(text, &CommandTable::defaults())
}

fn resolved(text: &str) -> hark::voice_command::ResolvedCommand {
    match resolve(text) {
        Resolution::Resolved(cmd) => cmd,
        Resolution::Unresolved => panic!("\"{text}\" did not resolve"),
    }
}

#[test]
fn trailing_words_after_a_trigger_still_match_exactly() {
    let cmd = resolved("what time is it please");
    assert_eq!(cmd.action, ActionKind::SayTime);
    assert_eq!(cmd.tier, MatchTier::Exact);
    assert!(!cmd.hedged);
}

#[test]
fn dynamic_trigger_passes_the_remainder_as_query() {
    let cmd = resolved("search for quantum computing");
    assert_eq!(cmd.action, ActionKind::SearchWeb);
    assert_eq!(cmd.params.get("query").map(String::as_str), Some("quantum computing"));
}

#[test]
fn casing_and_padding_are_ignored() {
    let cmd = resolved("  Tell Me A Joke  ");
    assert_eq!(cmd.action, ActionKind::TellJoke);
}

#[test]
fn misspelled_trigger_is_hedged() {
    let cmd = resolved("serch for cats");
    assert_eq!(cmd.tier, MatchTier::Fuzzy);
    assert_eq!(cmd.action, ActionKind::SearchWeb);
    assert_eq!(cmd.params.get("query").map(String::as_str), Some("cats"));
    assert!(cmd.hedged);
    assert_eq!(
        cmd.compose_response("Searching for cats."),
        "I think you said 'search for'. Searching for cats."
    );
}

#[test]
fn pattern_rules_catch_free_form_requests() {
    let cmd = resolved("could you lock my screen");
    assert_eq!(cmd.tier, MatchTier::Rule);
    assert_eq!(cmd.action, ActionKind::LockComputer);
    assert!(cmd.matched_trigger.is_none());
}

#[test]
fn nonsense_is_unresolved() {
    assert_eq!(resolve("banana pancakes"), Resolution::Unresolved);
    assert_eq!(resolve(""), Resolution::Unresolved);
}

#[test]
fn taught_triggers_win_over_rules() {
    let mut table = CommandTable::defaults();
    table
        .upsert(
            "lock my screen",
            ActionDescriptor::simple(ActionKind::OpenApp).with_param("app", "xlock"),
        )
        .unwrap();

    let Resolution::Resolved(cmd) = CommandResolver::default().resolve("lock my screen", &table)
    else {
        panic!("taught trigger should resolve");
    };
    assert_eq!(cmd.tier, MatchTier::Exact);
    assert_eq!(cmd.action, ActionKind::OpenApp);
    assert_eq!(cmd.params.get("app").map(String::as_str), Some("xlock"));
}

#[test]
fn similarity_of_identical_and_reordered_phrases() {
    for phrase in ["hey hark", "open notepad", "remind me to water the plants"] {
        assert_eq!(best_score(phrase, phrase), 100);
    }
    assert!(score("open notepad", "notepad open", Metric::Full) < 100);
    assert_eq!(score("open notepad", "notepad open", Metric::TokenSort), 100);
}
