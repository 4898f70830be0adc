use std::path::PathBuf;

use super::*;

fn test_settings() -> Settings {
    Settings {
        data_dir: PathBuf::from("/tmp/cronherd-test"),
        debug: false,
        jobs_module: "builtin".into(),
        nice_cmd: Some("nice".into()),
        ionice_cmd: Some("ionice".into()),
        remote_enabled: false,
        redis_url: "redis://127.0.0.1:6379/0".into(),
        heartbeat_enabled: false,
        heartbeat_url: "https://cronitor.link/{id}/{endpoint}".into(),
        chat_enabled: false,
        chat_url: None,
        chat_token: None,
        chat_channel: None,
        exception_cmd: None,
    }
}

#[test]
fn plain_job_gets_no_wrappers() {
    let spawner = Spawner::new(test_settings());
    let argv = spawner.build_argv("Sleep:seconds=1").unwrap();
    assert_eq!(&argv[1..], ["worker", "run", "Sleep:seconds=1"]);
    assert!(!argv[0].is_empty());
}

#[test]
fn cpu_priority_prepends_nice() {
    let spawner = Spawner::new(test_settings());
    let argv = spawner.build_argv("LowCpuSleep:seconds=1").unwrap();
    assert_eq!(&argv[..3], ["nice", "-n", "10"]);
}

#[test]
fn io_priority_prepends_ionice_with_class_data() {
    let spawner = Spawner::new(test_settings());
    let argv = spawner.build_argv("LowestCpuIoSleep").unwrap();
    assert_eq!(&argv[..3], ["nice", "-n", "19"]);
    assert_eq!(&argv[3..8], ["ionice", "-c", "2", "-n", "7"]);
}

#[test]
fn idle_io_priority_has_no_class_data() {
    let spawner = Spawner::new(test_settings());
    let argv = spawner.build_argv("IdleIoSleep").unwrap();
    assert_eq!(&argv[..3], ["ionice", "-c", "3"]);
    assert_ne!(argv.get(3).map(String::as_str), Some("-n"));
}

#[test]
fn missing_nice_binary_disables_cpu_wrapper() {
    let mut settings = test_settings();
    settings.nice_cmd = None;
    let spawner = Spawner::new(settings);
    let argv = spawner.build_argv("LowCpuSleep").unwrap();
    assert_ne!(argv[0], "nice");
}

#[test]
fn exception_wrapper_swallows_whole_command() {
    let mut settings = test_settings();
    settings.exception_cmd = Some("crash-catcher".into());
    let spawner = Spawner::new(settings);
    let argv = spawner.build_argv("LowCpuSleep:seconds=1").unwrap();
    assert_eq!(argv[0], "crash-catcher");
    assert_eq!(argv[1], "-c");
    assert_eq!(argv.len(), 3);
    assert!(argv[2].starts_with("nice -n 10 "));
    assert!(argv[2].contains("worker run"));
    assert!(argv[2].contains("LowCpuSleep"));
}

#[test]
fn only_enomem_is_retryable() {
    assert!(is_enomem(&std::io::Error::from_raw_os_error(libc::ENOMEM)));
    assert!(!is_enomem(&std::io::Error::from_raw_os_error(libc::EACCES)));
    assert!(!is_enomem(&std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "missing"
    )));
}

#[test]
fn unknown_job_is_invalid_params() {
    let spawner = Spawner::new(test_settings());
    assert!(spawner.build_argv("NoSuchJob").is_err());
}

#[test]
fn worker_env_forwards_cron_settings_and_extras() {
    let spawner = Spawner::with_extra_env(
        test_settings(),
        vec![("CRON_PROCESS_RESUMED".into(), "1".into())],
    );
    let env = spawner.worker_env();
    let get = |key: &str| {
        env.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    };
    assert_eq!(get("CRONHERD_DATA_DIR"), "/tmp/cronherd-test");
    assert_eq!(get("CRONHERD_DEBUG"), "0");
    assert_eq!(get("CRONHERD_NICE_CMD"), "nice");
    assert_eq!(get("CRONHERD_HEARTBEAT_ENABLED"), "0");
    assert_eq!(get("CRON_PROCESS_RESUMED"), "1");
}
