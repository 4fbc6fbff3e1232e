//! Bounded consumption of an engine's segment stream.
//!
//! The engine exposes no cancellation primitive, so both budgets here are
//! soft timeouts: they are checked cooperatively between segments and stop
//! further consumption, but cannot interrupt a segment the engine is still
//! producing. Enforcement is the loop's own monotonic-clock checks — there
//! is no watchdog thread and nothing preempts the producer.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::audio::AudioBuffer;
use crate::engine::SegmentStream;

/// Time budgets for one generation run.
#[derive(Debug, Clone, Copy)]
pub struct StreamBudgets {
    /// Ceiling on the whole run, measured from the start of consumption.
    pub total: Duration,
    /// Ceiling on a single segment, measured from the end of the previous
    /// segment's consumption.
    pub per_segment: Duration,
}

/// Why consumption ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The engine ran out of segments.
    Exhausted,
    /// The total budget elapsed; the partial result is kept.
    TotalBudget,
    /// One segment took longer than its budget; the partial result is kept.
    SegmentBudget,
    /// The stream yielded an error; the partial result is kept.
    StreamError,
}

/// Everything a consumption pass produced.
#[derive(Debug)]
pub struct StreamOutcome {
    /// Audio buffers in production order, one per segment that had audio.
    pub buffers: Vec<AudioBuffer>,
    /// Segments pulled from the stream, including any discarded over-budget
    /// segment.
    pub segments_seen: usize,
    /// Segments that carried audio and were accumulated.
    pub segments_with_audio: usize,
    pub stop: StopReason,
}

/// Drive the stream to completion or to a budget/error stop.
///
/// Segments without audio are skipped without failing the run. A mid-stream
/// engine error is logged with its category and ends consumption; whatever
/// was accumulated before it stands. A segment that arrives after a budget
/// has elapsed is discarded along with the rest of the stream.
pub fn consume(stream: SegmentStream, budgets: &StreamBudgets) -> StreamOutcome {
    let started = Instant::now();
    let mut segment_started = started;
    let mut outcome = StreamOutcome {
        buffers: Vec::new(),
        segments_seen: 0,
        segments_with_audio: 0,
        stop: StopReason::Exhausted,
    };

    for item in stream {
        let now = Instant::now();
        let segment = match item {
            Ok(segment) => segment,
            Err(err) => {
                log::warn!(
                    "segment stream failed ({} error), keeping partial result: {err}",
                    err.category()
                );
                outcome.stop = StopReason::StreamError;
                break;
            }
        };
        outcome.segments_seen += 1;

        if now.duration_since(started) > budgets.total {
            log::warn!(
                "total generation time exceeded {:.0?}, stopping",
                budgets.total
            );
            outcome.stop = StopReason::TotalBudget;
            break;
        }

        let segment_elapsed = now.duration_since(segment_started);
        if segment_elapsed > budgets.per_segment {
            log::warn!(
                "segment took too long ({:.1}s), stopping",
                segment_elapsed.as_secs_f64()
            );
            outcome.stop = StopReason::SegmentBudget;
            break;
        }
        segment_started = now;

        log::debug!("generated segment: {}", segment.graphemes);
        if let Some(phonemes) = &segment.phonemes {
            log::debug!("phonemes: {phonemes}");
        }

        match segment.audio {
            Some(buffer) => {
                outcome.segments_with_audio += 1;
                outcome.buffers.push(buffer);
            }
            None => log::debug!("segment carried no audio, skipping"),
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::{consume, StopReason, StreamBudgets};
    use crate::audio::AudioBuffer;
    use crate::engine::{EngineError, Segment, SegmentStream};
    use std::time::Duration;

    fn audio_segment(samples: Vec<f32>) -> Result<Segment, EngineError> {
        Ok(Segment {
            graphemes: "chunk".to_string(),
            phonemes: Some("tʃʌŋk".to_string()),
            audio: Some(AudioBuffer::new(samples, 24000)),
        })
    }

    fn silent_segment() -> Result<Segment, EngineError> {
        Ok(Segment {
            graphemes: "chunk".to_string(),
            phonemes: None,
            audio: None,
        })
    }

    /// Each item sleeps its delay before being handed to the consumer,
    /// standing in for engine inference time.
    fn delayed_stream(items: Vec<(u64, Result<Segment, EngineError>)>) -> SegmentStream {
        Box::new(items.into_iter().map(|(delay_ms, item)| {
            std::thread::sleep(Duration::from_millis(delay_ms));
            item
        }))
    }

    fn generous() -> Duration {
        Duration::from_secs(60)
    }

    #[test]
    fn exhausts_a_fast_stream() {
        let stream = delayed_stream(vec![
            (0, audio_segment(vec![0.1; 10])),
            (0, audio_segment(vec![0.2; 20])),
            (0, audio_segment(vec![0.3; 30])),
        ]);
        let outcome = consume(
            stream,
            &StreamBudgets {
                total: generous(),
                per_segment: generous(),
            },
        );

        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.segments_seen, 3);
        assert_eq!(outcome.segments_with_audio, 3);
        assert_eq!(outcome.buffers.len(), 3);
    }

    #[test]
    fn stops_when_the_total_budget_elapses() {
        // Three segments at ~60ms apiece against a 100ms total budget: the
        // first lands inside the budget, the second lands outside it and is
        // discarded, the third is never pulled.
        let stream = delayed_stream(vec![
            (60, audio_segment(vec![0.1; 10])),
            (60, audio_segment(vec![0.2; 10])),
            (60, audio_segment(vec![0.3; 10])),
        ]);
        let outcome = consume(
            stream,
            &StreamBudgets {
                total: Duration::from_millis(100),
                per_segment: generous(),
            },
        );

        assert_eq!(outcome.stop, StopReason::TotalBudget);
        assert_eq!(outcome.buffers.len(), 1);
        assert_eq!(outcome.segments_seen, 2);
    }

    #[test]
    fn stops_when_one_segment_exceeds_its_budget() {
        let stream = delayed_stream(vec![
            (1, audio_segment(vec![0.1; 10])),
            (120, audio_segment(vec![0.2; 10])),
            (1, audio_segment(vec![0.3; 10])),
        ]);
        let outcome = consume(
            stream,
            &StreamBudgets {
                total: generous(),
                per_segment: Duration::from_millis(50),
            },
        );

        assert_eq!(outcome.stop, StopReason::SegmentBudget);
        assert_eq!(outcome.buffers.len(), 1);
        assert_eq!(outcome.segments_seen, 2);
    }

    #[test]
    fn skips_segments_without_audio() {
        let stream = delayed_stream(vec![
            (0, audio_segment(vec![0.1; 10])),
            (0, silent_segment()),
            (0, audio_segment(vec![0.2; 10])),
        ]);
        let outcome = consume(
            stream,
            &StreamBudgets {
                total: generous(),
                per_segment: generous(),
            },
        );

        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.segments_seen, 3);
        assert_eq!(outcome.segments_with_audio, 2);
        assert_eq!(outcome.buffers.len(), 2);
    }

    #[test]
    fn mid_stream_error_keeps_the_partial_result() {
        let stream = delayed_stream(vec![
            (0, audio_segment(vec![0.1; 10])),
            (0, Err(EngineError::Runtime("inference failed".to_string()))),
            (0, audio_segment(vec![0.2; 10])),
        ]);
        let outcome = consume(
            stream,
            &StreamBudgets {
                total: generous(),
                per_segment: generous(),
            },
        );

        assert_eq!(outcome.stop, StopReason::StreamError);
        assert_eq!(outcome.buffers.len(), 1);
        assert_eq!(outcome.segments_seen, 1);
    }
}
