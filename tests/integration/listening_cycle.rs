//! End-to-end listening cycles over a scripted microphone and recognizer,
//! executing real built-in actions against the dry-run host.

use crate::helpers::{assistant, drain, wait_until};
use hark::audio::{LeaseHolder, LeaseRole};
use hark::history::CommandHistory;
use hark::listening::{NO_SPEECH_RESPONSE, UNINTELLIGIBLE_RESPONSE};
use hark::voice_command::MatchTier;
use hark::{ListeningState, RuntimeEvent};
use std::sync::Arc;

fn states(events: &[RuntimeEvent]) -> Vec<ListeningState> {
    events
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn history(a: &crate::helpers::TestAssistant) -> &Arc<CommandHistory> {
    a.dispatcher.history()
}

#[test]
fn typed_time_question_is_answered_and_recorded() {
    let a = assistant();
    let rx = a.events.subscribe();

    let response = a.machine.submit_text("What time is it please").unwrap();
    assert!(response.starts_with("It's "), "got {response}");

    let events = drain(&rx);
    assert_eq!(
        states(&events),
        [
            ListeningState::Processing,
            ListeningState::Responding,
            ListeningState::Idle
        ]
    );
    assert!(events.iter().any(|e| matches!(
        e,
        RuntimeEvent::CommandResolved { trigger, tier: MatchTier::Exact, .. }
            if trigger == "what time is it"
    )));
    assert_eq!(a.transcript.lines(), [response.clone()]);

    let entries = history(&a).entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].response, response);
}

#[test]
fn spoken_wake_phrase_runs_a_full_command_cycle() {
    let a = assistant();
    let rx = a.events.subscribe();
    a.mic.push(LeaseRole::Background, true);
    a.recognizer.hears("hey hark");
    a.mic.push(LeaseRole::Active, true);
    a.recognizer.hears("open notepad");

    assert!(a.machine.start_background().unwrap());
    let spoken = a.transcript.wait_for(1);
    assert_eq!(spoken, ["Opening notepad.exe."]);
    wait_until(|| !a.machine.is_busy() && a.machine.state() == ListeningState::BackgroundWatch);
    assert!(a.machine.stop_background());

    let events = drain(&rx);
    assert!(events.iter().any(|e| matches!(
        e,
        RuntimeEvent::WakeWordDetected { heard, .. } if heard == "hey hark"
    )));
    assert_eq!(
        states(&events),
        [
            ListeningState::BackgroundWatch,
            ListeningState::ActiveCapture,
            ListeningState::Processing,
            ListeningState::Responding,
            ListeningState::Idle,
            ListeningState::BackgroundWatch,
            ListeningState::Idle,
        ]
    );
    assert_eq!(a.machine.state(), ListeningState::Idle);
    assert_eq!(
        a.machine.session().state,
        ListeningState::Idle,
        "session snapshot agrees with state()"
    );
}

#[test]
fn silence_after_activation_says_nothing_was_heard() {
    let a = assistant();
    a.mic.push(LeaseRole::Active, false);

    assert!(a.machine.activate().unwrap());
    wait_until(|| !a.machine.is_busy());

    assert_eq!(a.transcript.lines(), [NO_SPEECH_RESPONSE]);
    assert!(history(&a).entries().is_empty());
    assert_eq!(a.machine.state(), ListeningState::Idle);
}

#[test]
fn garbled_speech_asks_to_repeat() {
    let a = assistant();
    a.mic.push(LeaseRole::Active, true);

    a.machine.activate().unwrap();
    wait_until(|| !a.machine.is_busy());

    assert_eq!(a.transcript.lines(), [UNINTELLIGIBLE_RESPONSE]);
}

#[test]
fn microphone_is_free_once_a_cycle_ends() {
    let a = assistant();
    a.mic.push(LeaseRole::Active, true);
    a.recognizer.hears("tell me a joke");

    a.machine.activate().unwrap();
    wait_until(|| !a.machine.is_busy());

    let spoken = a.transcript.lines();
    assert_eq!(spoken.len(), 1);
    assert!(hark::actions::JOKES.contains(&spoken[0].as_str()));
    assert_eq!(a.arbiter.holder().holder, LeaseHolder::None);
    assert!(!a.arbiter.is_held());
}

#[test]
fn unknown_phrases_are_remembered_for_teaching() {
    let a = assistant();

    let response = a.machine.submit_text("banana pancakes").unwrap();
    assert_eq!(response, hark::dispatch::UNRECOGNIZED_RESPONSE);
    assert_eq!(history(&a).unrecognized(), ["banana pancakes"]);
}

#[test]
fn notes_round_trip_through_typed_commands() {
    let a = assistant();

    let created = a
        .machine
        .submit_text("create note titled groceries saying buy milk")
        .unwrap();
    assert!(created.starts_with("Note created"), "got {created}");

    let listed = a.machine.submit_text("list notes").unwrap();
    assert!(listed.contains("groceries"), "got {listed}");

    let deleted = a.machine.submit_text("delete note groceries").unwrap();
    assert_eq!(deleted, "Note groceries deleted.");
    assert_eq!(
        a.machine.submit_text("list notes").unwrap(),
        "You don't have any notes yet."
    );
}

#[test]
fn disabling_background_listening_returns_to_idle() {
    let a = assistant();

    a.machine.set_background_listening(true).unwrap();
    wait_until(|| a.machine.state() == ListeningState::BackgroundWatch);
    assert!(a.machine.is_background_running());

    a.machine.set_background_listening(false).unwrap();
    assert!(!a.machine.is_background_running());
    assert_eq!(a.machine.state(), ListeningState::Idle);
}
