use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    Warning,
    Trace,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "info",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Trace => "trace",
        })
    }
}

#[macro_export]
macro_rules! notify {
    () => {};

    ($($arg:tt)*) => {{
        $crate::append(format!($($arg)*), $crate::Level::Info);
    }};
}

#[macro_export]
macro_rules! strong {
    () => {};

    ($($arg:tt)*) => {{
        $crate::append(format!($($arg)*), $crate::Level::Error);
    }};
}

#[macro_export]
macro_rules! warning {
    () => {};

    ($($arg:tt)*) => {{
        $crate::append(format!($($arg)*), $crate::Level::Warning);
    }};
}

#[macro_export]
macro_rules! trace {
    () => {};

    ($($arg:tt)*) => {{
        $crate::append(format!($($arg)*), $crate::Level::Trace);
    }};
}

pub static LOGGER: Lazy<Mutex<Logger<300>>> = Lazy::new(|| Mutex::new(Logger::new()));

/// Append a line to the global logger, ignoring lock poisoning.
pub fn append(line: String, level: Level) {
    let mut logger = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    logger.append(line, level);
}

pub struct Logger<const N: usize> {
    lines: [(String, Level); N],
    head: usize,
    len: usize,
}

impl<const N: usize> Logger<N> {
    pub fn new() -> Self {
        Self {
            lines: std::array::from_fn(|_| (String::new(), Level::Trace)),
            head: 0,
            len: 0,
        }
    }

    pub fn append(&mut self, line: String, level: Level) {
        self.lines[self.head] = (line + "\n", level);
        self.head = (self.head + 1) % N;
        self.len += 1;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Number of lines currently held, at most `N`.
    pub fn len(&self) -> usize {
        self.len.min(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn lines(&self) -> (&[(String, Level)], &[(String, Level)]) {
        if self.len < N {
            (&self.lines[0..self.len], &[])
        } else {
            // wrapped around, so we need to return two slices
            let (a, b) = self.lines.split_at(self.head);

            (b, a)
        }
    }

    /// Iterate over the held lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Level)> {
        let (a, b) = self.lines();
        a.iter().chain(b).map(|(line, level)| (line.trim_end_matches('\n'), *level))
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        let lines = self.lines();

        for (line, level) in lines.0.iter().chain(lines.1) {
            out += &format!("[{level}] {line}");
        }

        out
    }
}

impl<const N: usize> Default for Logger<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around() {
        let mut logger = Logger::<3>::new();
        for idx in 0..5 {
            logger.append(format!("line {idx}"), Level::Info);
        }

        let lines: Vec<&str> = logger.iter().map(|(line, _)| line).collect();
        assert_eq!(lines, ["line 2", "line 3", "line 4"]);
        assert_eq!(logger.len(), 3);
    }

    #[test]
    fn format_tags_levels() {
        let mut logger = Logger::<4>::new();
        logger.append("loaded".to_string(), Level::Info);
        logger.append("bad name".to_string(), Level::Warning);

        assert_eq!(logger.format(), "[info] loaded\n[warning] bad name\n");
    }

    #[test]
    fn clear_forgets_everything() {
        let mut logger = Logger::<4>::new();
        logger.append("x".to_string(), Level::Trace);
        logger.clear();

        assert!(logger.is_empty());
        assert_eq!(logger.iter().count(), 0);
    }
}
