use std::collections::BTreeMap;

use tempfile::TempDir;

use super::*;

fn kwargs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn class_lock_base_name_is_bare_name() {
    let base = lock_base_name("Report", LockRegime::Class, &args(&["x"]), &kwargs(&[]));
    assert_eq!(base, "Report");
}

#[test]
fn params_lock_base_name_appends_stable_hash() {
    let a = args(&["2024"]);
    let kw = kwargs(&[("format", "csv")]);
    let first = lock_base_name("Report", LockRegime::Params, &a, &kw);
    let second = lock_base_name("Report", LockRegime::Params, &a, &kw);
    assert_eq!(first, second);
    assert_eq!(first.len(), "Report".len() + 1 + 10);
    assert!(first.starts_with("Report_"));

    let other = lock_base_name("Report", LockRegime::Params, &a, &kwargs(&[("format", "pdf")]));
    assert_ne!(first, other);
}

#[test]
fn no_lock_base_name_gets_fresh_random_suffix() {
    let a = args(&[]);
    let kw = kwargs(&[("seconds", "1")]);
    let first = lock_base_name("Sleep", LockRegime::None, &a, &kw);
    let second = lock_base_name("Sleep", LockRegime::None, &a, &kw);
    assert_ne!(first, second);
    // name + hash10 + rand10 with separators
    assert_eq!(first.len(), "Sleep".len() + 1 + 10 + 1 + 10);
    // shared prefix up to the random part
    assert_eq!(first[..16], second[..16]);
}

#[test]
fn pid_file_round_trips_pid() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "Report");
    assert!(!pid_file.exists());
    pid_file.write(4321).unwrap();
    assert!(pid_file.exists());
    assert_eq!(pid_file.pid(), Some(4321));
    pid_file.delete().unwrap();
    assert!(!pid_file.exists());
}

#[test]
fn truncated_pid_file_reads_as_no_value() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "Report");
    std::fs::write(pid_file.path(), "").unwrap();
    assert_eq!(pid_file.pid(), None);
    std::fs::write(pid_file.path(), "not-a-pid").unwrap();
    assert_eq!(pid_file.pid(), None);
}

#[test]
fn delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "Report");
    pid_file.delete().unwrap();
    pid_file.write(1).unwrap();
    pid_file.delete().unwrap();
    pid_file.delete().unwrap();
}

#[test]
fn lock_check_deletes_file_of_dead_process() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "Report");
    pid_file.write(4_194_000).unwrap();
    assert!(!pid_file.exists_with_alive_process());
    assert!(!pid_file.exists(), "stale file should have been reaped");
}

#[test]
fn lock_check_deletes_truncated_file() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "Report");
    std::fs::write(pid_file.path(), "").unwrap();
    assert!(!pid_file.exists_with_alive_process());
    assert!(!pid_file.exists());
}

#[test]
fn lock_check_honors_alive_process() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "Report");
    pid_file.write(std::process::id()).unwrap();
    assert!(pid_file.exists_with_alive_process());
    assert!(pid_file.exists());
}

#[test]
fn enumeration_filters_by_lock_name_prefix() {
    let dir = TempDir::new().unwrap();
    PidFile::new(dir.path(), "Report").write(1).unwrap();
    PidFile::new(dir.path(), "Report_0123456789").write(2).unwrap();
    PidFile::new(dir.path(), "Cleanup").write(3).unwrap();
    JobSpecFile::new(dir.path(), "Report")
        .create("Report")
        .unwrap();

    let all = PidFile::all(dir.path(), None);
    assert_eq!(all.len(), 3);

    let filter = NameFilter {
        name: "Report".to_string(),
        ..NameFilter::default()
    };
    let mut filtered: Vec<_> = PidFile::all(dir.path(), Some(&filter))
        .into_iter()
        .map(|f| f.base().to_string())
        .collect();
    filtered.sort();
    assert_eq!(filtered, ["Report", "Report_0123456789"]);
}

#[test]
fn by_pid_finds_owner_and_skips_garbled_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Broken.pid"), "garbage").unwrap();
    PidFile::new(dir.path(), "Report").write(7777).unwrap();
    let found = PidFile::by_pid(dir.path(), 7777).expect("pid file found");
    assert_eq!(found.base(), "Report");
    assert!(PidFile::by_pid(dir.path(), 8888).is_none());
}

#[test]
fn job_spec_file_take_spec_deletes_before_returning() {
    let dir = TempDir::new().unwrap();
    let job_spec_file = JobSpecFile::new(dir.path(), "PersistentSleep");
    job_spec_file.create("PersistentSleep:seconds=5").unwrap();
    let spec = job_spec_file.take_spec().unwrap();
    assert_eq!(spec.as_deref(), Some("PersistentSleep:seconds=5"));
    assert!(!job_spec_file.exists());
    // Second take is a clean miss.
    assert_eq!(job_spec_file.take_spec().unwrap(), None);
}

#[test]
fn siblings_share_a_base_name() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "PersistentSleep");
    let job_spec_file = pid_file.job_spec_file();
    assert_eq!(job_spec_file.base(), pid_file.base());
    assert_eq!(job_spec_file.pid_file().path(), pid_file.path());
}

#[test]
fn job_spec_by_pid_requires_both_siblings() {
    let dir = TempDir::new().unwrap();
    let pid_file = PidFile::new(dir.path(), "PersistentSleep");
    pid_file.write(6543).unwrap();
    assert!(JobSpecFile::by_pid(dir.path(), 6543).is_none());
    pid_file
        .job_spec_file()
        .create("PersistentSleep:seconds=5")
        .unwrap();
    let found = JobSpecFile::by_pid(dir.path(), 6543).expect("jobspec by pid");
    assert_eq!(found.base(), "PersistentSleep");
}
