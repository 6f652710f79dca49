//! Process creation

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Starts processes for the resolver
pub trait ProcessSpawner: Send + Sync {
    /// Hand a URI to the desktop's protocol handler, returning the opener's pid
    fn open_uri(&self, uri: &str) -> io::Result<u32>;

    /// Start `program` detached from our stdio
    fn spawn(&self, program: &Path, args: &[String], working_dir: Option<&Path>) -> io::Result<u32>;
}

/// Spawner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSpawner;

impl OsSpawner {
    pub fn new() -> Self {
        Self
    }

    fn uri_opener() -> Command {
        if cfg!(windows) {
            Command::new("explorer")
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        }
    }
}

impl ProcessSpawner for OsSpawner {
    fn open_uri(&self, uri: &str) -> io::Result<u32> {
        let mut cmd = Self::uri_opener();
        cmd.arg(uri);
        detach(&mut cmd);

        let child = cmd.spawn()?;
        Ok(child.id())
    }

    fn spawn(&self, program: &Path, args: &[String], working_dir: Option<&Path>) -> io::Result<u32> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        detach(&mut cmd);

        let child = cmd.spawn()?;
        Ok(child.id())
    }
}

fn detach(cmd: &mut Command) {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
}

pub mod mock {
    //! Recording spawner for tests

    use super::ProcessSpawner;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// One recorded spawn request
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SpawnRecord {
        Uri(String),
        Program {
            path: PathBuf,
            args: Vec<String>,
            working_dir: Option<PathBuf>,
        },
    }

    #[derive(Debug, Default)]
    struct SpawnState {
        records: Vec<SpawnRecord>,
        uri_failure: Option<io::ErrorKind>,
        program_failure: Option<io::ErrorKind>,
        next_pid: u32,
    }

    /// Records requests instead of starting processes. Clones share state.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSpawner {
        state: Arc<Mutex<SpawnState>>,
    }

    impl RecordingSpawner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail every URI open with `kind`
        pub fn failing_uris(self, kind: io::ErrorKind) -> Self {
            if let Ok(mut state) = self.state.lock() {
                state.uri_failure = Some(kind);
            }
            self
        }

        /// Fail every program spawn with `kind`
        pub fn failing_programs(self, kind: io::ErrorKind) -> Self {
            if let Ok(mut state) = self.state.lock() {
                state.program_failure = Some(kind);
            }
            self
        }

        pub fn records(&self) -> Vec<SpawnRecord> {
            self.state.lock().map(|s| s.records.clone()).unwrap_or_default()
        }

        fn record(&self, record: SpawnRecord, failure: impl Fn(&SpawnState) -> Option<io::ErrorKind>) -> io::Result<u32> {
            let mut state = self
                .state
                .lock()
                .map_err(|_| io::Error::other("spawner state poisoned"))?;
            state.records.push(record);
            if let Some(kind) = failure(&*state) {
                return Err(io::Error::new(kind, "simulated spawn failure"));
            }
            state.next_pid += 1;
            Ok(1000 + state.next_pid)
        }
    }

    impl ProcessSpawner for RecordingSpawner {
        fn open_uri(&self, uri: &str) -> io::Result<u32> {
            self.record(SpawnRecord::Uri(uri.to_string()), |s| s.uri_failure)
        }

        fn spawn(&self, program: &Path, args: &[String], working_dir: Option<&Path>) -> io::Result<u32> {
            self.record(
                SpawnRecord::Program {
                    path: program.to_path_buf(),
                    args: args.to_vec(),
                    working_dir: working_dir.map(Path::to_path_buf),
                },
                |s| s.program_failure,
            )
        }
    }
}
