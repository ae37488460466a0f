//! Simple logger: writes to stderr, to an optional log file and notifies
//! registered listeners.

use crate::lazy_static::lazy_static;
use crate::parking_lot::Mutex;
use std::fmt::{Debug, Display};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::Sender;

lazy_static! {
    static ref LOG: Mutex<Log> = Mutex::new(Log {
        verbosity: MessageKind::Information,
        listeners: Default::default(),
        file: None,
    });
}

/// A message that could be sent by the logger to all listeners.
pub struct LogMessage {
    /// Kind of the message: information, warning or error.
    pub kind: MessageKind,
    /// The source message without logger prefixes.
    pub content: String,
}

/// A kind of message.
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Ord, Hash, Debug)]
#[repr(u32)]
pub enum MessageKind {
    /// Some useful information.
    Information = 0,
    /// A warning.
    Warning = 1,
    /// An error of some kind.
    Error = 2,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Information => "[INFO]: ",
            MessageKind::Warning => "[WARNING]: ",
            MessageKind::Error => "[ERROR]: ",
        }
    }
}

/// See module docs.
pub struct Log {
    verbosity: MessageKind,
    listeners: Vec<Sender<LogMessage>>,
    file: Option<File>,
}

impl Log {
    fn write_internal<S>(&mut self, kind: MessageKind, message: S)
    where
        S: AsRef<str>,
    {
        let mut msg = message.as_ref().to_owned();
        if kind as u32 >= self.verbosity as u32 {
            // Notify listeners about the message and remove all disconnected listeners.
            self.listeners.retain(|listener| {
                listener
                    .send(LogMessage {
                        kind,
                        content: msg.clone(),
                    })
                    .is_ok()
            });

            msg.insert_str(0, kind.as_str());
            msg.push('\n');

            eprint!("{msg}");

            if let Some(file) = self.file.as_mut() {
                // A failed file write must never take the renderer down.
                let _ = file.write_all(msg.as_bytes());
            }
        }
    }

    /// Writes a message of the given kind into the log.
    pub fn writeln<S>(kind: MessageKind, message: S)
    where
        S: AsRef<str>,
    {
        LOG.lock().write_internal(kind, message)
    }

    /// Writes an information message into the log.
    pub fn info<S>(message: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Information, message)
    }

    /// Writes a warning message into the log.
    pub fn warning<S>(message: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Warning, message)
    }

    /// Writes an error message into the log.
    pub fn err<S>(message: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Error, message)
    }

    /// Sets the logger verbosity; messages of a lower severity are dropped.
    pub fn set_verbosity(kind: MessageKind) {
        LOG.lock().verbosity = kind;
    }

    /// Mirrors every message into the given file from now on. Replaces the
    /// previous log file, if any.
    pub fn set_file(file: Option<File>) {
        LOG.lock().file = file;
    }

    /// Creates (truncating) a log file at the given path and mirrors every
    /// message into it.
    pub fn set_file_path<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        Self::set_file(Some(file));
        Ok(())
    }

    /// Registers a new listener that will receive a copy of every message.
    pub fn add_listener(listener: Sender<LogMessage>) {
        LOG.lock().listeners.push(listener)
    }

    /// Logs an error of the given result (if any) and returns the result back.
    pub fn verify<T, E>(result: Result<T, E>) -> Result<T, E>
    where
        E: Debug,
    {
        if let Err(ref e) = result {
            Self::writeln(
                MessageKind::Error,
                format!("An error has occurred: {:?}", e),
            );
        }
        result
    }

    /// Logs an error of the given result (if any).
    pub fn verify_message<T, E, S>(result: &Result<T, E>, message: S)
    where
        E: Display,
        S: AsRef<str>,
    {
        if let Err(e) = result {
            Self::writeln(
                MessageKind::Error,
                format!("{}. Reason: {}", message.as_ref(), e),
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Log, MessageKind};
    use std::fs;

    #[test]
    fn log_mirrors_messages_into_the_file() {
        let path = std::env::temp_dir().join("ember_log_test.log");
        Log::set_file_path(&path).unwrap();
        Log::writeln(MessageKind::Error, "file sink check");
        // Detach so the file is flushed and closed before reading.
        Log::set_file(None);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[ERROR]: file sink check"));
        let _ = fs::remove_file(&path);
    }
}
