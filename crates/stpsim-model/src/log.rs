//! Bridge diagnostic log.
//!
//! The protocol engine emits diagnostic text in fragments, possibly split
//! mid-line across several callback invocations. The log buffers one
//! in-progress line and keeps every completed line for the bridge's
//! lifetime; completed lines survive protocol disable, the in-progress
//! fragment does not.

use stpsim_types::{PortIndex, TreeIndex};

/// One completed diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeLogLine {
    /// Line text, without trailing newline.
    pub text: String,
    /// Port the line refers to, if scoped to one.
    pub port: Option<PortIndex>,
    /// Tree the line refers to, if scoped to one.
    pub tree: Option<TreeIndex>,
}

#[derive(Debug)]
struct PendingLine {
    text: String,
    port: Option<PortIndex>,
    tree: Option<TreeIndex>,
}

/// Completed lines plus the single in-progress line.
#[derive(Debug, Default)]
pub(crate) struct BridgeLog {
    lines: Vec<BridgeLogLine>,
    current: Option<PendingLine>,
}

impl BridgeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All completed lines, oldest first.
    pub fn lines(&self) -> &[BridgeLogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Appends a fragment to the in-progress line, completing lines as
    /// needed. Completed lines are pushed onto `completed` (in addition to
    /// the permanent log) so the caller can publish notifications for them
    /// once the protocol lock is released.
    ///
    /// A fragment scoped differently from the buffered line completes the
    /// buffered line first. `flush` completes the line being assembled; a
    /// flush with nothing buffered and an empty fragment is a no-op.
    pub fn append_fragment(
        &mut self,
        port: Option<PortIndex>,
        tree: Option<TreeIndex>,
        fragment: &str,
        flush: bool,
        completed: &mut Vec<BridgeLogLine>,
    ) {
        let scope_changed = self
            .current
            .as_ref()
            .is_some_and(|current| current.port != port || current.tree != tree);
        if scope_changed {
            self.complete_current(completed);
        }

        if !fragment.is_empty() {
            let current = self.current.get_or_insert_with(|| PendingLine {
                text: String::new(),
                port,
                tree,
            });
            current.text.push_str(fragment);
        }

        if flush {
            self.complete_current(completed);
        }
    }

    /// Appends an already-complete line (e.g. an FDB-flush record) and
    /// queues it for notification. The in-progress line is unaffected.
    pub fn push_line(
        &mut self,
        text: String,
        port: Option<PortIndex>,
        tree: Option<TreeIndex>,
        completed: &mut Vec<BridgeLogLine>,
    ) {
        let line = BridgeLogLine { text, port, tree };
        self.lines.push(line.clone());
        completed.push(line);
    }

    /// Discards the in-progress line, if any. Used on protocol disable:
    /// the line was never completed, so no notification is owed.
    pub fn discard_current(&mut self) {
        self.current = None;
    }

    /// Rolls the log back to `mark` completed lines and drops the
    /// in-progress fragment. Used when engine construction fails and the
    /// session's output must not survive.
    pub fn truncate(&mut self, mark: usize) {
        self.lines.truncate(mark);
        self.current = None;
    }

    fn complete_current(&mut self, completed: &mut Vec<BridgeLogLine>) {
        if let Some(current) = self.current.take() {
            let line = BridgeLogLine {
                text: current.text,
                port: current.port,
                tree: current.tree,
            };
            self.lines.push(line.clone());
            completed.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fragments_assemble_one_line() {
        let mut log = BridgeLog::new();
        let mut completed = Vec::new();

        log.append_fragment(Some(0), Some(0), "Hello, ", false, &mut completed);
        log.append_fragment(Some(0), Some(0), "world", true, &mut completed);

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].text, "Hello, world");
        assert_eq!(log.lines().len(), 1);

        // A second flush with nothing buffered must not duplicate the line.
        log.append_fragment(Some(0), Some(0), "", true, &mut completed);
        assert_eq!(completed.len(), 1);
        assert_eq!(log.lines().len(), 1);
    }

    #[test]
    fn test_scope_change_completes_buffered_line() {
        let mut log = BridgeLog::new();
        let mut completed = Vec::new();

        log.append_fragment(Some(0), Some(0), "port zero", false, &mut completed);
        log.append_fragment(Some(1), Some(0), "port one", true, &mut completed);

        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].text, "port zero");
        assert_eq!(completed[0].port, Some(0));
        assert_eq!(completed[1].text, "port one");
        assert_eq!(completed[1].port, Some(1));
    }

    #[test]
    fn test_discard_current_keeps_completed_lines() {
        let mut log = BridgeLog::new();
        let mut completed = Vec::new();

        log.append_fragment(None, None, "done", true, &mut completed);
        log.append_fragment(None, None, "in flight", false, &mut completed);
        log.discard_current();

        assert_eq!(log.lines().len(), 1);
        assert_eq!(log.lines()[0].text, "done");

        // The dropped fragment is gone; a later flush emits nothing.
        log.append_fragment(None, None, "", true, &mut completed);
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn test_truncate_rolls_back() {
        let mut log = BridgeLog::new();
        let mut completed = Vec::new();

        log.append_fragment(None, None, "kept", true, &mut completed);
        let mark = log.len();
        log.append_fragment(None, None, "rolled back", true, &mut completed);
        log.append_fragment(None, None, "partial", false, &mut completed);
        log.truncate(mark);

        assert_eq!(log.lines().len(), 1);
        assert_eq!(log.lines()[0].text, "kept");
    }

    #[test]
    fn test_push_line_leaves_pending_intact() {
        let mut log = BridgeLog::new();
        let mut completed = Vec::new();

        log.append_fragment(Some(2), Some(0), "assembling", false, &mut completed);
        log.push_line("flush record".to_string(), Some(2), Some(0), &mut completed);
        log.append_fragment(Some(2), Some(0), " still", true, &mut completed);

        assert_eq!(log.lines().len(), 2);
        assert_eq!(log.lines()[0].text, "flush record");
        assert_eq!(log.lines()[1].text, "assembling still");
    }
}
