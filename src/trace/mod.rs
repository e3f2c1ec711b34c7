//! Recording and comparing execution traces of instrumented tests.
//!
//! Instrumented bodies call four recording entry points (see
//! [`crate::instrument::RecordingApi`]). Whatever executes those bodies forwards the calls
//! to a [`Recorder`], an injected capability rather than a process-wide logger.
//! [`MemoryRecorder`] is the in-process implementation: it collects the events in order and
//! hands them out as a [`TraceLog`].
//!
//! Two logs, one recorded against each build, are compared with [`compare_traces`]. For
//! every test the first diverging event is reported.
//!
//! # Thread Safety
//!
//! [`MemoryRecorder`] guards its buffer with a [`Mutex`], tests may record from several
//! threads. Events of concurrently running tests interleave in arrival order.
//!
//! # Examples
//!
//! ```rust
//! use ildiff::trace::{compare_traces, MemoryRecorder, Recorder};
//!
//! let old = MemoryRecorder::new();
//! old.start_test("AccountTests");
//! old.record_void_instance_call("Account#1", ".ctor");
//! old.record_instance_call("Account#1", "100", "Balance");
//! old.end_test();
//!
//! let new = MemoryRecorder::new();
//! new.start_test("AccountTests");
//! new.record_void_instance_call("Account#1", ".ctor");
//! new.record_instance_call("Account#1", "90", "Balance");
//! new.end_test();
//!
//! let comparison = compare_traces(&old.take(), &new.take());
//! assert!(comparison.is_divergent());
//! assert_eq!(comparison.divergences[0].test(), "AccountTests");
//! ```

use std::{fmt, path::Path, sync::Mutex};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Receiver of the recording entry points.
///
/// Object arguments arrive rendered as text, the way the executing host prints them.
pub trait Recorder: Send + Sync {
    /// A test starts.
    fn start_test(&self, name: &str);

    /// The running test ends.
    fn end_test(&self);

    /// A construction or a call whose result is not consumed.
    fn record_void_instance_call(&self, target: &str, signature: &str);

    /// A call and its result.
    fn record_instance_call(&self, target: &str, value: &str, signature: &str);
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    /// `StartTest(name)`
    StartTest {
        /// Test name
        name: String,
    },
    /// `RecordVoidInstanceCall(target, signature)`
    VoidCall {
        /// The object under test
        target: String,
        /// The callee
        signature: String,
    },
    /// `RecordInstanceCall(target, value, signature)`
    Call {
        /// The object under test
        target: String,
        /// The result of the call
        value: String,
        /// The callee
        signature: String,
    },
    /// `EndTest()`
    EndTest,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::StartTest { name } => write!(f, "start {name}"),
            TraceEvent::VoidCall { target, signature } => write!(f, "{target}.{signature}()"),
            TraceEvent::Call {
                target,
                value,
                signature,
            } => write!(f, "{target}.{signature}() = {value}"),
            TraceEvent::EndTest => write!(f, "end"),
        }
    }
}

/// In-memory [`Recorder`].
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemoryRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: TraceEvent) {
        lock!(self.events).push(event);
    }

    /// A copy of the events recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        lock!(self.events).clone()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        lock!(self.events).len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        lock!(self.events).is_empty()
    }

    /// Move the recorded events out, leaving the recorder empty.
    pub fn take(&self) -> TraceLog {
        TraceLog {
            events: std::mem::take(&mut *lock!(self.events)),
        }
    }
}

impl Recorder for MemoryRecorder {
    fn start_test(&self, name: &str) {
        self.push(TraceEvent::StartTest {
            name: name.to_string(),
        });
    }

    fn end_test(&self) {
        self.push(TraceEvent::EndTest);
    }

    fn record_void_instance_call(&self, target: &str, signature: &str) {
        self.push(TraceEvent::VoidCall {
            target: target.to_string(),
            signature: signature.to_string(),
        });
    }

    fn record_instance_call(&self, target: &str, value: &str, signature: &str) {
        self.push(TraceEvent::Call {
            target: target.to_string(),
            value: value.to_string(),
            signature: signature.to_string(),
        });
    }
}

/// The events of one test, from its `StartTest` up to and including its `EndTest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTrace {
    /// Test name
    pub name: String,
    /// Events after `StartTest`
    pub events: Vec<TraceEvent>,
}

impl TestTrace {
    /// Returns `true` if the test reached `EndTest`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.events.last() == Some(&TraceEvent::EndTest)
    }
}

/// An ordered sequence of events, persisted as JSON lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceLog {
    /// Recorded events in arrival order
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    /// Create a log from `events`.
    #[must_use]
    pub fn new(events: Vec<TraceEvent>) -> Self {
        TraceLog { events }
    }

    /// Split the log into tests. Events outside any test are dropped with a warning.
    #[must_use]
    pub fn tests(&self) -> Vec<TestTrace> {
        let mut tests: Vec<TestTrace> = Vec::new();
        let mut open = false;

        for event in &self.events {
            match event {
                TraceEvent::StartTest { name } => {
                    tests.push(TestTrace {
                        name: name.clone(),
                        events: Vec::new(),
                    });
                    open = true;
                }
                _ if !open => log::warn!("trace event outside of a test dropped: {event}"),
                _ => {
                    if let Some(test) = tests.last_mut() {
                        test.events.push(event.clone());
                    }
                    open = *event != TraceEvent::EndTest;
                }
            }
        }

        tests
    }

    /// Serialize to JSON lines, one event per line.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] if an event can not be serialized.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse JSON lines. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] for the first line that is not an event.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        let events = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<Vec<TraceEvent>, _>>()?;
        Ok(TraceLog { events })
    }

    /// Write the log to `path` as JSON lines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file can not be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_jsonl()?)?;
        Ok(())
    }

    /// Read a log written by [`TraceLog::write_to`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file can not be read and
    /// [`crate::Error::JsonError`] if it is not a trace.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_jsonl(&std::fs::read_to_string(path)?)
    }
}

/// A difference between the traces of two runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// The first event at which a test behaves differently. `None` means the trace ended.
    Event {
        /// Test name
        test: String,
        /// Zero-based index into the events of the test
        position: usize,
        /// Event of the old run
        old: Option<TraceEvent>,
        /// Event of the new run
        new: Option<TraceEvent>,
    },
    /// The test ran against the old build only
    MissingTest {
        /// Test name
        test: String,
    },
    /// The test ran against the new build only
    AddedTest {
        /// Test name
        test: String,
    },
}

impl Divergence {
    /// Name of the affected test.
    #[must_use]
    pub fn test(&self) -> &str {
        match self {
            Divergence::Event { test, .. }
            | Divergence::MissingTest { test }
            | Divergence::AddedTest { test } => test,
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |event: &Option<TraceEvent>| {
            event
                .as_ref()
                .map_or_else(|| "<end of trace>".to_string(), ToString::to_string)
        };

        match self {
            Divergence::Event {
                test,
                position,
                old,
                new,
            } => write!(
                f,
                "{test} #{position}: {} -> {}",
                show(old),
                show(new)
            ),
            Divergence::MissingTest { test } => write!(f, "{test}: not run against new build"),
            Divergence::AddedTest { test } => write!(f, "{test}: not run against old build"),
        }
    }
}

/// The outcome of [`compare_traces`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceComparison {
    /// Tests whose traces are identical
    pub matching: usize,
    /// One entry per diverging test
    pub divergences: Vec<Divergence>,
}

impl TraceComparison {
    /// Returns `true` if any test diverged.
    #[must_use]
    pub fn is_divergent(&self) -> bool {
        !self.divergences.is_empty()
    }
}

/// Compare the traces of two runs test by test.
///
/// Tests are paired by name; a name that occurs several times is paired by occurrence.
#[must_use]
pub fn compare_traces(old: &TraceLog, new: &TraceLog) -> TraceComparison {
    let mut pending = new.tests();
    let mut comparison = TraceComparison::default();

    for old_test in old.tests() {
        let Some(position) = pending.iter().position(|test| test.name == old_test.name) else {
            comparison.divergences.push(Divergence::MissingTest {
                test: old_test.name,
            });
            continue;
        };
        let new_test = pending.remove(position);

        match first_divergence(&old_test.events, &new_test.events) {
            None => comparison.matching += 1,
            Some(index) => comparison.divergences.push(Divergence::Event {
                test: old_test.name,
                position: index,
                old: old_test.events.get(index).cloned(),
                new: new_test.events.get(index).cloned(),
            }),
        }
    }

    comparison
        .divergences
        .extend(pending.into_iter().map(|test| Divergence::AddedTest { test: test.name }));
    comparison
}

fn first_divergence(old: &[TraceEvent], new: &[TraceEvent]) -> Option<usize> {
    old.iter()
        .zip(new)
        .position(|(a, b)| a != b)
        .or_else(|| (old.len() != new.len()).then_some(old.len().min(new.len())))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn run(recorder: &dyn Recorder, name: &str, balance: &str) {
        recorder.start_test(name);
        recorder.record_void_instance_call("Account#1", ".ctor");
        recorder.record_instance_call("Account#1", balance, "Balance");
        recorder.end_test();
    }

    #[test]
    fn identical_runs_match() {
        let old = MemoryRecorder::new();
        let new = MemoryRecorder::new();
        run(&old, "A", "1");
        run(&new, "A", "1");

        let comparison = compare_traces(&old.take(), &new.take());
        assert!(!comparison.is_divergent());
        assert_eq!(comparison.matching, 1);
        assert!(old.is_empty());
    }

    #[test]
    fn first_divergent_event_is_reported() {
        let old = MemoryRecorder::new();
        let new = MemoryRecorder::new();
        run(&old, "A", "100");
        run(&new, "A", "90");
        run(&old, "B", "1");
        run(&new, "B", "1");

        let comparison = compare_traces(&old.take(), &new.take());
        assert_eq!(comparison.matching, 1);
        assert_eq!(
            comparison.divergences,
            vec![Divergence::Event {
                test: "A".to_string(),
                position: 1,
                old: Some(TraceEvent::Call {
                    target: "Account#1".to_string(),
                    value: "100".to_string(),
                    signature: "Balance".to_string(),
                }),
                new: Some(TraceEvent::Call {
                    target: "Account#1".to_string(),
                    value: "90".to_string(),
                    signature: "Balance".to_string(),
                }),
            }]
        );
    }

    #[test]
    fn truncated_trace_diverges_at_its_end() {
        let old = TraceLog::new(vec![
            TraceEvent::StartTest { name: "A".into() },
            TraceEvent::VoidCall {
                target: "x".into(),
                signature: ".ctor".into(),
            },
            TraceEvent::EndTest,
        ]);
        let new = TraceLog::new(vec![
            TraceEvent::StartTest { name: "A".into() },
            TraceEvent::VoidCall {
                target: "x".into(),
                signature: ".ctor".into(),
            },
        ]);

        let comparison = compare_traces(&old, &new);
        assert_eq!(
            comparison.divergences,
            vec![Divergence::Event {
                test: "A".into(),
                position: 1,
                old: Some(TraceEvent::EndTest),
                new: None,
            }]
        );
        assert!(!new.tests()[0].is_complete());
    }

    #[test]
    fn unpaired_tests_are_reported() {
        let old = MemoryRecorder::new();
        let new = MemoryRecorder::new();
        run(&old, "Gone", "1");
        run(&new, "Fresh", "1");

        let comparison = compare_traces(&old.take(), &new.take());
        assert_eq!(
            comparison.divergences,
            vec![
                Divergence::MissingTest {
                    test: "Gone".into()
                },
                Divergence::AddedTest {
                    test: "Fresh".into()
                },
            ]
        );
    }

    #[test]
    fn stray_events_are_dropped() {
        let log = TraceLog::new(vec![
            TraceEvent::EndTest,
            TraceEvent::StartTest { name: "A".into() },
            TraceEvent::EndTest,
            TraceEvent::VoidCall {
                target: "x".into(),
                signature: "y".into(),
            },
        ]);

        let tests = log.tests();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].events, vec![TraceEvent::EndTest]);
    }

    #[test]
    fn jsonl_file_round_trip() {
        let recorder = MemoryRecorder::new();
        run(&recorder, "A", "1");
        let log = recorder.take();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        log.write_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with(r#"{"event":"StartTest","name":"A"}"#));
        assert_eq!(TraceLog::from_file(&path).unwrap(), log);
    }

    #[test]
    fn bad_line_is_an_error() {
        assert!(matches!(
            TraceLog::from_jsonl("{\"event\":\"Nope\"}"),
            Err(crate::Error::JsonError(_))
        ));
    }

    #[test]
    fn concurrent_recording() {
        let recorder = Arc::new(MemoryRecorder::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for _ in 0..25 {
                        recorder.record_void_instance_call(&worker.to_string(), "Tick");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.len(), 100);
    }
}
