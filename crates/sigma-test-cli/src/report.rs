//! Tab-separated per-rule report written to the run's output sink.

use std::io::Write;
use std::path::Path;

use crate::verdict::Verdict;

/// Writes one tab-separated line per rule, followed by its failures.
///
/// ```text
/// rules/ssh.yaml	PASS
/// rules/web.yaml	FAIL
/// 	{dst_port: 22} shouldn't have matched
/// ```
pub struct Reporter<W: Write> {
    out: W,
    all_passed: bool,
    recorded: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Reporter {
            out,
            all_passed: true,
            recorded: 0,
        }
    }

    pub fn record(&mut self, path: &Path, verdict: &Verdict) -> std::io::Result<()> {
        writeln!(self.out, "{}\t{}", path.display(), verdict.tag())?;
        for failure in verdict.failures() {
            writeln!(self.out, "\t{failure}")?;
        }
        self.all_passed &= verdict.is_success();
        self.recorded += 1;
        Ok(())
    }

    /// True while every recorded verdict is `Pass` or `Skip`.
    pub fn all_passed(&self) -> bool {
        self.all_passed
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Flush the sink and return the aggregate outcome.
    pub fn finish(mut self) -> std::io::Result<bool> {
        self.out.flush()?;
        Ok(self.all_passed)
    }
}
