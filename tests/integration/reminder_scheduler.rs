//! Spoken reminder requests flowing into the scheduler, on paused tokio time.

use hark::actions::{ActionExecutor, BuiltinExecutor, DryRunHost};
use hark::config::SchedulerConfig;
use hark::locate::Locator;
use hark::notes::NotesStore;
use hark::scheduler::{ReminderScheduler, ScheduledTask};
use hark::{CommandResolver, CommandTable, Resolution};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Fixture {
    scheduler: ReminderScheduler,
    executor: BuiltinExecutor,
    fired: Arc<Mutex<Vec<String>>>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let scheduler = ReminderScheduler::new(
        tokio::runtime::Handle::current(),
        SchedulerConfig::default(),
        Box::new(move |task: &ScheduledTask| {
            sink.lock().unwrap().push(task.description.clone());
        }),
    );
    let executor = BuiltinExecutor::new(
        Arc::new(DryRunHost),
        NotesStore::open(dir.path().join("notes")).unwrap(),
        Locator::new(Vec::new()),
    )
    .with_reminders(scheduler.clone());
    Fixture {
        scheduler,
        executor,
        fired,
        _dir: dir,
    }
}

fn say(f: &Fixture, text: &str) -> String {
    let Resolution::Resolved(cmd) = CommandResolver::default().resolve(text, &CommandTable::defaults())
    else {
        panic!("\"{text}\" did not resolve");
    };
    f.executor.execute(cmd.action, &cmd.params).unwrap()
}

async fn minutes(n: u64) {
    tokio::time::sleep(Duration::from_secs(n * 60) + Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn spoken_reminder_fires_after_its_delay() {
    let f = fixture();

    let response = say(&f, "remind me to stretch in 2 minutes");
    assert_eq!(response, "I'll remind you about stretch in 2 minutes.");
    assert_eq!(f.scheduler.active().len(), 1);

    minutes(1).await;
    assert!(f.fired.lock().unwrap().is_empty());
    minutes(1).await;
    assert_eq!(*f.fired.lock().unwrap(), ["stretch"]);
    assert!(f.scheduler.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_reminder_never_fires() {
    let f = fixture();

    say(&f, "remind me to water the plants in 10 minutes");
    let active = f.scheduler.active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].description, "water the plants");

    assert!(f.scheduler.cancel(active[0].id));
    assert!(!f.scheduler.cancel(active[0].id));
    minutes(11).await;

    assert!(f.fired.lock().unwrap().is_empty());
    assert!(f.scheduler.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reminders_fire_in_due_order() {
    let f = fixture();

    say(&f, "remind me to call mom in 3 minutes");
    say(&f, "remind me to check the oven in 1 minute");
    let order: Vec<_> = f
        .scheduler
        .active()
        .into_iter()
        .map(|t| t.description)
        .collect();
    assert_eq!(order, ["check the oven", "call mom"]);

    minutes(3).await;
    assert_eq!(*f.fired.lock().unwrap(), ["check the oven", "call mom"]);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_delays_are_clamped() {
    let f = fixture();

    let response = say(&f, "remind me to renew the passport in 500 minutes");
    assert_eq!(response, "I'll remind you about renew the passport in 60 minutes.");

    let response = say(&f, "remind me to blink");
    assert_eq!(response, "I'll remind you about blink in 5 minutes.");
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_pending_reminders() {
    let f = fixture();

    say(&f, "remind me to leave in 1 minute");
    f.scheduler.shutdown();
    minutes(2).await;

    assert!(f.fired.lock().unwrap().is_empty());
    assert!(f.scheduler.schedule("late", Duration::from_secs(1)).is_err());
}
