use super::*;
use tempfile::TempDir;

// Above any real pid_max, so never a live process.
const DEAD_PID: u32 = i32::MAX as u32;

fn temp_pid_file() -> (TempDir, PidFile) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cronos.pid");
    (dir, PidFile::new(path))
}

#[test]
fn test_pid_file_new() {
    let pid = PidFile::new("/tmp/cronos.pid");
    assert_eq!(pid.path(), Path::new("/tmp/cronos.pid"));
    assert!(!pid.is_locked());
}

#[test]
fn test_missing_file_reads_none() {
    let (_dir, pid) = temp_pid_file();
    assert!(!pid.exists());
    assert!(pid.read_pid().unwrap().is_none());
    assert!(pid.running_pid().unwrap().is_none());
}

#[test]
fn test_write_and_read_pid() {
    let (_dir, mut pid) = temp_pid_file();
    pid.write_pid_value(12345).unwrap();

    assert!(pid.exists());
    assert_eq!(pid.read_pid().unwrap(), Some(12345));
    assert!(pid.is_locked());
}

#[test]
fn test_garbage_contents_is_read_error() {
    let (_dir, pid) = temp_pid_file();
    fs::write(pid.path(), "not a pid").unwrap();

    let err = pid.read_pid().unwrap_err();
    assert!(matches!(err, DaemonError::PidFileRead { .. }));
}

#[test]
fn test_remove_nonexistent_is_ok() {
    let (_dir, mut pid) = temp_pid_file();
    assert!(pid.remove().is_ok());
    assert!(!pid.is_locked());
}

#[test]
fn test_try_acquire_fresh() {
    let (_dir, mut pid) = temp_pid_file();
    pid.try_acquire().unwrap();

    assert!(pid.is_locked());
    assert_eq!(pid.read_pid().unwrap(), Some(std::process::id()));
}

#[test]
fn test_try_acquire_replaces_stale_file() {
    let (_dir, pid) = temp_pid_file();
    fs::write(pid.path(), DEAD_PID.to_string()).unwrap();
    assert!(pid.running_pid().unwrap().is_none());

    let mut fresh = PidFile::new(pid.path());
    fresh.try_acquire().unwrap();
    assert_eq!(fresh.read_pid().unwrap(), Some(std::process::id()));
}

#[test]
fn test_try_acquire_refuses_live_owner() {
    let (_dir, pid) = temp_pid_file();
    // The test process itself stands in for a running daemon.
    fs::write(pid.path(), std::process::id().to_string()).unwrap();

    let mut second = PidFile::new(pid.path());
    let err = second.try_acquire().unwrap_err();
    assert!(matches!(err, DaemonError::AlreadyRunning { .. }));
    assert!(!second.is_locked());
    assert!(pid.exists());
}

#[test]
fn test_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deep").join("cronos.pid");
    let mut pid = PidFile::new(&path);

    pid.write_pid_value(12345).unwrap();
    assert!(path.exists());
}

#[test]
fn test_is_process_running() {
    assert!(PidFile::is_process_running(std::process::id()));
    assert!(!PidFile::is_process_running(DEAD_PID));
}

#[test]
fn test_drop_removes_locked_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cronos.pid");

    {
        let mut pid = PidFile::new(&path);
        pid.write_pid_value(12345).unwrap();
        assert!(path.exists());
    }

    assert!(!path.exists());
}

#[test]
fn test_drop_leaves_foreign_file() {
    let (_dir, pid) = temp_pid_file();
    fs::write(pid.path(), "4242").unwrap();
    let path = pid.path().to_path_buf();

    drop(pid);
    assert!(path.exists());
}
