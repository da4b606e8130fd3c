//! Rolling file sink: append-mode active segment with date-stamped rotation.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, Utc};

/// Size caps cross the provisioning boundary in kilobytes.
pub(crate) const BYTES_PER_KB: u64 = 1024;

/// Date stamp embedded in rotated segment names.
const ROTATION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Rotating file writer for one channel.
///
/// The active segment lives at the configured path and is opened in append
/// mode. When the UTC date changes between writes (or on a forced [`roll`]),
/// the active segment is renamed to `{path}.{date}`, with a numeric sequence
/// suffix when that day already has rotated segments, and a fresh active
/// file is opened. After each rotation, the oldest rotated segments are
/// removed first until at most `max_history` remain and, when a size cap is
/// set, until their summed size fits under the cap.
///
/// Encoded form per entry is the formatted message followed by a blank line.
///
/// [`roll`]: RollingSink::roll
pub struct RollingSink {
    path: PathBuf,
    charset: String,
    max_history: usize,
    size_cap_bytes: u64,
    state: Mutex<SinkState>,
}

struct SinkState {
    writer: BufWriter<File>,
    opened: NaiveDate,
}

struct Segment {
    path: PathBuf,
    size: u64,
    date: NaiveDate,
    seq: u64,
}

impl RollingSink {
    /// Open the active segment at `path`, creating parent directories and
    /// the file itself as needed. `size_cap_bytes` of 0 means uncapped.
    pub fn open(
        path: impl Into<PathBuf>,
        charset: impl Into<String>,
        max_history: usize,
        size_cap_bytes: u64,
    ) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            charset: charset.into(),
            max_history,
            size_cap_bytes,
            state: Mutex::new(SinkState {
                writer: BufWriter::new(file),
                opened: Utc::now().date_naive(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Append one formatted entry, rotating first if the UTC date has
    /// changed since the active segment was opened.
    pub fn write(&self, formatted: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();

        if Utc::now().date_naive() != state.opened {
            self.rotate_locked(&mut state)?;
        }

        state.writer.write_all(formatted.as_bytes())?;
        state.writer.write_all(b"\n\n")?;
        state.writer.flush()
    }

    /// Force a rotation of the active segment.
    pub fn roll(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.rotate_locked(&mut state)
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writer.flush()
    }

    fn rotate_locked(&self, state: &mut SinkState) -> io::Result<()> {
        state.writer.flush()?;

        let rotated = self.next_rotated_path(state.opened);
        fs::rename(&self.path, &rotated)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        state.writer = BufWriter::new(file);
        state.opened = Utc::now().date_naive();

        self.prune()
    }

    /// First unused rotated name for the given stamp: `{path}.{date}`, then
    /// `{path}.{date}.1`, `{path}.{date}.2` and so on.
    fn next_rotated_path(&self, stamp: NaiveDate) -> PathBuf {
        let base = format!(
            "{}.{}",
            self.path.display(),
            stamp.format(ROTATION_DATE_FORMAT)
        );

        let mut candidate = PathBuf::from(&base);
        let mut seq = 0u64;
        while candidate.exists() {
            seq += 1;
            candidate = PathBuf::from(format!("{}.{}", base, seq));
        }
        candidate
    }

    /// Rotated segments for this sink, oldest first (by date, then by
    /// sequence within a day). Files not matching the rotated naming shape
    /// are ignored.
    fn segments(&self) -> io::Result<Vec<Segment>> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let active = match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Ok(Vec::new()),
        };
        let prefix = format!("{}.", active);

        let mut segments = Vec::new();
        for entry in fs::read_dir(parent)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(remainder) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some((date, seq)) = parse_rotation_suffix(remainder) else {
                continue;
            };

            segments.push(Segment {
                path: entry.path(),
                size: entry.metadata()?.len(),
                date,
                seq,
            });
        }

        segments.sort_by_key(|segment| (segment.date, segment.seq));
        Ok(segments)
    }

    /// Drop the oldest rotated segments beyond `max_history`, then keep
    /// dropping oldest-first while the retained segments exceed the size
    /// cap. The active segment does not count against the cap.
    fn prune(&self) -> io::Result<()> {
        let mut segments = self.segments()?;

        while segments.len() > self.max_history {
            fs::remove_file(&segments[0].path)?;
            segments.remove(0);
        }

        if self.size_cap_bytes > 0 {
            let mut total: u64 = segments.iter().map(|segment| segment.size).sum();
            while total > self.size_cap_bytes && !segments.is_empty() {
                total -= segments[0].size;
                fs::remove_file(&segments[0].path)?;
                segments.remove(0);
            }
        }

        Ok(())
    }
}

impl Drop for RollingSink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.writer.flush();
        }
    }
}

/// Parse `2026-08-07` or `2026-08-07.3` into its date and sequence parts.
fn parse_rotation_suffix(remainder: &str) -> Option<(NaiveDate, u64)> {
    let date_part = remainder.get(..10)?;
    let date = NaiveDate::parse_from_str(date_part, ROTATION_DATE_FORMAT).ok()?;

    match remainder.get(10..) {
        None | Some("") => Some((date, 0)),
        Some(rest) => {
            let seq = rest.strip_prefix('.')?.parse().ok()?;
            Some((date, seq))
        }
    }
}
