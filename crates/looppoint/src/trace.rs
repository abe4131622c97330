//! Committed-instruction traces.
//!
//! One committed instruction per line:
//!
//! ```text
//! <thread> 0x<pc> 0x<npc> <flags>
//! ```
//!
//! `flags` is `-` or any combination of `u` (user mode, the default),
//! `k` (kernel mode), `c` (control), `d` (direct control), `m` (micro-op)
//! and `l` (last micro-op). `#` starts a comment. Files ending in `.zst`
//! are zstd-compressed.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use looppoint_core::{Addr, StaticInst, ThreadContext};

/// Trace reading errors.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A committed instruction with the thread state it committed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitRecord {
    pub thread: usize,
    pub pc: Addr,
    pub npc: Addr,
    pub user: bool,
    pub control: bool,
    pub direct: bool,
    pub microop: bool,
    pub last_microop: bool,
}

impl CommitRecord {
    /// A user-mode, non-control instruction falling through to `npc`.
    #[must_use]
    pub const fn new(thread: usize, pc: Addr, npc: Addr) -> Self {
        Self {
            thread,
            pc,
            npc,
            user: true,
            control: false,
            direct: false,
            microop: false,
            last_microop: false,
        }
    }

    /// A direct control transfer from `pc` to `target`.
    #[must_use]
    pub const fn branch(thread: usize, pc: Addr, target: Addr) -> Self {
        Self {
            control: true,
            direct: true,
            ..Self::new(thread, pc, target)
        }
    }

    #[must_use]
    pub const fn kernel(self) -> Self {
        Self { user: false, ..self }
    }

    /// Parse a trace line. Blank and comment-only lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem for malformed lines.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.split_once('#').map_or(line, |(data, _)| data).trim();
        if line.is_empty() {
            return Ok(None);
        }

        let pattern = RECORD_PATTERN.get_or_init(|| {
            Regex::new(r"^(\d+)\s+0[xX]([0-9a-fA-F]+)\s+0[xX]([0-9a-fA-F]+)\s+(-|[ukcdml]+)$")
                .unwrap()
        });
        let caps = pattern
            .captures(line)
            .ok_or_else(|| format!("expected '<thread> 0x<pc> 0x<npc> <flags>', got '{line}'"))?;

        let thread = caps[1]
            .parse::<usize>()
            .map_err(|e| format!("invalid thread id '{}': {e}", &caps[1]))?;
        let pc = Addr::from_str_radix(&caps[2], 16).map_err(|e| format!("invalid pc: {e}"))?;
        let npc = Addr::from_str_radix(&caps[3], 16).map_err(|e| format!("invalid npc: {e}"))?;

        let mut record = Self::new(thread, pc, npc);
        for flag in caps[4].chars() {
            match flag {
                'u' => record.user = true,
                'k' => record.user = false,
                'c' => record.control = true,
                'd' => record.direct = true,
                'm' => record.microop = true,
                'l' => record.last_microop = true,
                _ => {}
            }
        }
        Ok(Some(record))
    }
}

impl fmt::Display for CommitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = String::new();
        if !self.user {
            flags.push('k');
        }
        for (set, flag) in [
            (self.control, 'c'),
            (self.direct, 'd'),
            (self.microop, 'm'),
            (self.last_microop, 'l'),
        ] {
            if set {
                flags.push(flag);
            }
        }
        if flags.is_empty() {
            flags.push('-');
        }
        write!(f, "{} {:#x} {:#x} {}", self.thread, self.pc, self.npc, flags)
    }
}

impl ThreadContext for CommitRecord {
    fn pc(&self) -> Addr {
        self.pc
    }

    fn npc(&self) -> Addr {
        self.npc
    }

    fn in_user_mode(&self) -> bool {
        self.user
    }
}

impl StaticInst for CommitRecord {
    fn is_microop(&self) -> bool {
        self.microop
    }

    fn is_last_microop(&self) -> bool {
        self.last_microop
    }

    fn is_control(&self) -> bool {
        self.control
    }

    fn is_direct_ctrl(&self) -> bool {
        self.direct
    }
}

/// Streaming reader over trace lines.
pub struct TraceReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> TraceReader<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<CommitRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            match CommitRecord::parse(&text) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(reason) => {
                    return Some(Err(TraceError::Malformed {
                        line: self.line,
                        reason,
                    }));
                }
            }
        }
    }
}

/// Open a trace file, decompressing `.zst` files.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the zstd stream cannot
/// be initialized.
pub fn open_trace(path: &Path) -> Result<TraceReader<Box<dyn BufRead>>, TraceError> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "zst") {
        Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(TraceReader::new(reader))
}

static RECORD_PATTERN: OnceLock<Regex> = OnceLock::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_instruction() {
        let record = CommitRecord::parse("0 0x1000 0x1004 -").unwrap().unwrap();
        assert_eq!(record, CommitRecord::new(0, 0x1000, 0x1004));
        assert!(record.in_user_mode());
        assert!(!record.is_control());
    }

    #[test]
    fn test_parse_flags() {
        let record = CommitRecord::parse("3 0x2010 0x2000 kcdml  # back edge")
            .unwrap()
            .unwrap();
        assert_eq!(record.thread, 3);
        assert!(!record.user);
        assert!(record.control && record.direct);
        assert!(record.microop && record.last_microop);
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(CommitRecord::parse(""), Ok(None));
        assert_eq!(CommitRecord::parse("   "), Ok(None));
        assert_eq!(CommitRecord::parse("# header"), Ok(None));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(CommitRecord::parse("0 0x1000").is_err());
        assert!(CommitRecord::parse("0 1000 0x1004 -").is_err());
        assert!(CommitRecord::parse("0 0x1000 0x1004 z").is_err());
        assert!(CommitRecord::parse("0 0x1ffffffffffffffff 0x0 -").is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let records = [
            CommitRecord::new(1, 0x40, 0x44),
            CommitRecord::branch(0, 0x48, 0x40).kernel(),
        ];
        for record in records {
            assert_eq!(CommitRecord::parse(&record.to_string()), Ok(Some(record)));
        }
        assert_eq!(records[1].to_string(), "0 0x48 0x40 kcd");
    }

    #[test]
    fn test_reader_reports_line_numbers() {
        let text = "# trace\n0 0x10 0x14 -\n\n0 0x14 bad -\n";
        let results: Vec<_> = TraceReader::new(text.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(TraceError::Malformed { line, .. }) => assert_eq!(*line, 4),
            other => panic!("expected malformed line, got {other:?}"),
        }
    }
}
