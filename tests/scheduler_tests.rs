//! Unit tests for alarm cycle scheduling.

mod common;

use common::{FakeClock, MemStorage, SLOTS};
use gazpar_probe::config::{ALARM_TIME, PERSIST_INTERVAL_CYCLES};
use gazpar_probe::scheduler::{AlarmTime, Scheduler};
use gazpar_probe::storage::{CounterStore, Persisted};

#[test]
fn test_alarm_period() {
    assert_eq!(ALARM_TIME.period_secs(), 900);
    assert_eq!(AlarmTime::new(1, 2, 3).period_secs(), 3723);
    assert_eq!(AlarmTime::new(0, 0, 0).period_secs(), 0);
}

#[test]
fn test_arm_counts_cycles_and_arms_clock() {
    let mut store = CounterStore::new(MemStorage::new(), SLOTS, PERSIST_INTERVAL_CYCLES);
    let mut sched = Scheduler::new(FakeClock::default(), ALARM_TIME);
    assert_eq!(sched.cycle(), 0);

    for expected in 1..=3 {
        sched.arm_next_alarm(&mut store, 5000).unwrap();
        assert_eq!(sched.cycle(), expected);
    }

    assert_eq!(sched.clock().armed, vec![ALARM_TIME; 3]);
}

#[test]
fn test_persists_on_day_boundaries() {
    let mut store = CounterStore::new(MemStorage::new(), SLOTS, PERSIST_INTERVAL_CYCLES);
    let mut sched = Scheduler::new(FakeClock::default(), ALARM_TIME);

    let mut saved = Vec::new();
    for pulses in 1..=200u32 {
        if let Persisted::Saved(v) = sched.arm_next_alarm(&mut store, pulses).unwrap() {
            saved.push((sched.cycle(), v));
        }
    }

    assert_eq!(saved, vec![(96, 96), (192, 192)]);
    assert_eq!(store.storage().saved_values(), vec![96, 192]);
    assert_eq!(store.storage().durable_index(), Some(192));
}

#[test]
fn test_arms_even_when_save_fails() {
    let mut mem = MemStorage::new();
    mem.fail_writes = true;
    let mut store = CounterStore::new(mem, SLOTS, 1);
    let mut sched = Scheduler::new(FakeClock::default(), ALARM_TIME);

    assert!(sched.arm_next_alarm(&mut store, 5000).is_err());
    assert_eq!(sched.cycle(), 1);
    assert_eq!(sched.clock().armed.len(), 1);
}
