//! Console rendering of a finished run's log.
//!
//! Reporters only read the log, after execution has finished.

use std::io::{self, Write};

use probe_core::{EventLog, LogEntry};

const TIME_FORMAT: &str = "%H:%M:%S";

/// Trait for rendering log entries
pub trait Reporter {
    /// Render one entry
    fn on_entry(&mut self, entry: &LogEntry) -> io::Result<()>;

    /// Render every entry in log order
    fn report(&mut self, log: &EventLog) -> io::Result<()> {
        for entry in log {
            self.on_entry(entry)?;
        }
        Ok(())
    }
}

/// Writes `HH:MM:SS: Saved <record>` lines, with a `Message:` line under each
/// entry that was not saved.
pub struct ConsoleReporter<W> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_entry(&mut self, entry: &LogEntry) -> io::Result<()> {
        let time = entry.record.timestamp.format(TIME_FORMAT);
        match &entry.outcome {
            Ok(_) => writeln!(self.out, "{time}: Saved {}", entry.record),
            Err(e) => {
                writeln!(self.out, "{time}: Not Saved {}", entry.record)?;
                writeln!(self.out, "Message: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use probe_core::{record, DbResource, MemoryStore, Value};

    use super::*;

    #[test]
    fn test_saved_and_unsaved_entries() {
        let mut log = EventLog::new();
        let mut store = MemoryStore::new();
        {
            let mut resource = DbResource::acquire(&mut store).unwrap();
            record(&mut log, Some(&mut resource), &Value::Int(1), Some("x"), Some(3));
        }
        record(&mut log, None, &Value::str("a"), Some("s"), Some(4));

        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&log).unwrap();
        let text = String::from_utf8(reporter.into_inner()).unwrap();

        let first = log.entries()[0].record.timestamp.format(TIME_FORMAT);
        let second = log.entries()[1].record.timestamp.format(TIME_FORMAT);
        assert_eq!(
            text,
            format!(
                "{first}: Saved x = 1 <int> (line 3)\n\
                 {second}: Not Saved s = \"a\" <str> (line 4)\n\
                 Message: No persistence resource was passed to the hook\n"
            )
        );
    }

    #[test]
    fn test_empty_log_prints_nothing() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&EventLog::new()).unwrap();
        assert!(reporter.into_inner().is_empty());
    }
}
