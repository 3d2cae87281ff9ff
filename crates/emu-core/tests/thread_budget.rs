use emu_core::threads::{auto_threads, ThreadBudget, ThreadSetting};

#[test]
fn auto_budget_divides_cores_between_processes() {
    assert_eq!(auto_threads(16, 4), 4);
    assert_eq!(auto_threads(16, 3), 5);
    assert_eq!(auto_threads(8, 8), 1);
    assert_eq!(auto_threads(4, 15), 1);
    assert_eq!(auto_threads(0, 1), 1);
    assert_eq!(auto_threads(8, 0), 8);
}

#[test]
fn auto_budget_never_oversubscribes_when_cores_suffice() {
    for cores in 1..=64 {
        for processes in 1..=cores {
            let budget = ThreadBudget::auto(cores, processes);
            assert!(budget.threads >= 1);
            assert!(budget.total_threads() <= cores);
        }
    }
}

#[test]
fn explicit_setting_is_capped_when_it_oversubscribes() {
    let budget = ThreadBudget::resolve(ThreadSetting::Explicit(8), 8, 4);
    assert!(budget.capped);
    assert_eq!(budget.threads, 2);

    let single = ThreadBudget::resolve(ThreadSetting::Explicit(1), 8, 4);
    assert!(!single.capped);
    assert_eq!(single.threads, 1);
}

#[test]
fn thread_setting_parses_environment_values() {
    assert_eq!(ThreadSetting::parse("4").unwrap(), ThreadSetting::Explicit(4));
    assert_eq!(ThreadSetting::parse(" ").unwrap(), ThreadSetting::Auto);
    let err = ThreadSetting::parse("0").unwrap_err();
    assert_eq!(err.code(), "config_threads_env");
    assert!(ThreadSetting::parse("many").is_err());
}
