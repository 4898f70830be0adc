//! CLI surface tests: worker and scheduler commands against a scratch
//! data directory, exercising the real binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use cronherd::jobs::LockRegime;
use cronherd::worker::files::{lock_base_name, JobSpecFile, PidFile};

fn cronherd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cronherd").expect("binary builds");
    cmd.env("CRONHERD_DATA_DIR", data_dir.path())
        .env("CRONHERD_REMOTE_ENABLED", "0")
        .env("CRONHERD_CHAT_ENABLED", "0")
        .env("CRONHERD_HEARTBEAT_ENABLED", "0")
        .env_remove("CRONHERD_CRONTAB");
    cmd
}

#[test]
fn worker_status_on_empty_host() {
    let dir = TempDir::new().unwrap();
    cronherd(&dir)
        .args(["worker", "status"])
        .assert()
        .success()
        .stdout("STATUS:\nNo PID file(s) found.\n");
}

#[test]
fn worker_run_sleep_succeeds_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    cronherd(&dir)
        .args(["worker", "run", "Sleep:seconds=0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: Processed Sleep:seconds=0"));
    assert!(PidFile::all(dir.path(), None).is_empty());
}

#[test]
fn worker_run_without_spec_fails_fast() {
    let dir = TempDir::new().unwrap();
    cronherd(&dir).args(["worker", "run"]).assert().failure();
}

#[test]
fn worker_run_unknown_job_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    cronherd(&dir)
        .args(["worker", "run", "NoSuchJob"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidParams"));
}

#[test]
fn params_lock_collision_refuses_same_args_only() {
    let dir = TempDir::new().unwrap();

    // A live process (this test) holds the lock for seconds=10.
    let spec_kwargs = [("seconds".to_string(), "10".to_string())]
        .into_iter()
        .collect();
    let base = lock_base_name("ParamsLockedSleep", LockRegime::Params, &[], &spec_kwargs);
    PidFile::new(dir.path(), &base)
        .write(std::process::id())
        .unwrap();

    cronherd(&dir)
        .args(["worker", "run", "ParamsLockedSleep:seconds=10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Locked:"));

    // A different params hash takes a different lock file.
    cronherd(&dir)
        .args(["worker", "run", "ParamsLockedSleep:seconds=0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "OK: Processed ParamsLockedSleep:seconds=0",
        ));
}

#[test]
fn worker_clean_removes_dead_state() {
    let dir = TempDir::new().unwrap();
    PidFile::new(dir.path(), "Stale").write(4_194_000).unwrap();
    JobSpecFile::new(dir.path(), "Stale")
        .create("PersistentSleep:seconds=5")
        .unwrap();

    cronherd(&dir)
        .args(["worker", "clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CLEAN PID FILES:"))
        .stdout(predicate::str::contains("Stale\tDELETED"));

    assert!(!PidFile::new(dir.path(), "Stale").exists());
    assert!(!JobSpecFile::new(dir.path(), "Stale").exists());
}

#[test]
fn worker_info_lists_builtin_jobs() {
    let dir = TempDir::new().unwrap();
    cronherd(&dir)
        .args(["worker", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PersistentSleep\tclass\tresumable"));
    cronherd(&dir)
        .args(["worker", "info", "ParamsLockedSleep"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lock_regime: params"));
}

#[test]
fn scheduler_disable_enable_cycle() {
    let dir = TempDir::new().unwrap();

    cronherd(&dir)
        .args(["scheduler", "disable", "--workers"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Scheduler disabled (lock file created, workers suspended).",
        ));
    assert!(dir.path().join("scheduler.lock").exists());

    // A tick while locked refuses without failing.
    cronherd(&dir)
        .args(["scheduler", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SchedulerLocked:"));

    cronherd(&dir)
        .args(["scheduler", "enable", "--workers"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Scheduler enabled (resume file created, lock file deleted).",
        ));
    assert!(!dir.path().join("scheduler.lock").exists());
    assert!(dir.path().join("scheduler.resume").exists());

    // Enabling again is a no-op warning.
    cronherd(&dir)
        .args(["scheduler", "enable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SchedulerUnlocked:"));
}

#[test]
fn scheduler_tick_starts_due_jobs() {
    let dir = TempDir::new().unwrap();
    cronherd(&dir)
        .env(
            "CRONHERD_CRONTAB",
            "* * * * *|Sleep:seconds=0;* * * * *|Sleep:seconds=1",
        )
        .args(["scheduler", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started 2 job(s)"));
}

#[test]
fn scheduler_tick_with_no_due_jobs_reports_none() {
    let dir = TempDir::new().unwrap();
    // A yearly firing outside any two-minute window... use Feb 29 at
    // 05:30 to make an accidental hit implausible.
    cronherd(&dir)
        .env("CRONHERD_CRONTAB", "30 5 29 2 *|Sleep:seconds=0")
        .args(["scheduler", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs started."));
}
