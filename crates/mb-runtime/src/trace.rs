use std::sync::{Mutex, PoisonError};

// `depth` is the execution-stack depth at the time of the step.
pub trait TraceSink: Send + Sync {
    fn trace(&self, depth: usize, line: &str);
}

#[derive(Debug, Default)]
pub struct BufferTrace {
    lines: Mutex<Vec<String>>,
}

impl BufferTrace {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TraceSink for BufferTrace {
    fn trace(&self, depth: usize, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{}{}", "  ".repeat(depth), line));
    }
}
