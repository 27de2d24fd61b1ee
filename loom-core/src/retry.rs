//! Retry Stream (spec §4.5): wraps one generator invocation as a sequence
//! of validated [`StreamEvent`]s, recovering from recoverable errors with a
//! corrective continuation instead of surfacing them to the subscriber.
//!
//! Already-emitted valid events are never rewound; `accepted_patch_count`
//! is tracked across attempts, not reset per attempt, per spec §9's
//! mandated resolution of that ambiguity.

use std::collections::HashMap;

use futures::StreamExt;
use serde::Deserialize;

use crate::error::{ParseError, PatchValidationError, RecoverableError, RetryError};
use crate::generator::{Generator, GeneratorToken, Usage};
use crate::model::{Action, Patch, Stats, StreamEvent};
use crate::validator::ScratchDocument;

/// Accumulates generator text output into newline-delimited records.
#[derive(Default)]
struct LineAccumulator {
    buffer: String,
}

impl LineAccumulator {
    fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').to_string();
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

#[derive(Deserialize)]
struct WirePatch {
    selector: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attr: Option<HashMap<String, Option<String>>>,
    #[serde(default)]
    append: Option<String>,
    #[serde(default)]
    prepend: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    remove: Option<bool>,
}

impl TryFrom<WirePatch> for Patch {
    type Error = String;

    fn try_from(w: WirePatch) -> Result<Patch, String> {
        let present = [
            w.text.is_some(),
            w.attr.is_some(),
            w.append.is_some(),
            w.prepend.is_some(),
            w.html.is_some(),
            w.remove.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count();
        if present != 1 {
            return Err(format!(
                "patch for selector '{}' must set exactly one operation field",
                w.selector
            ));
        }
        if let Some(text) = w.text {
            return Ok(Patch::SetText {
                selector: w.selector,
                text,
            });
        }
        if let Some(attr) = w.attr {
            return Ok(Patch::SetAttributes {
                selector: w.selector,
                attr,
            });
        }
        if let Some(html) = w.append {
            return Ok(Patch::AppendHtml {
                selector: w.selector,
                html,
            });
        }
        if let Some(html) = w.prepend {
            return Ok(Patch::PrependHtml {
                selector: w.selector,
                html,
            });
        }
        if let Some(html) = w.html {
            return Ok(Patch::SetInnerHtml {
                selector: w.selector,
                html,
            });
        }
        if w.remove == Some(true) {
            return Ok(Patch::Remove {
                selector: w.selector,
            });
        }
        Err(format!(
            "patch for selector '{}' must set exactly one operation field",
            w.selector
        ))
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRecord {
    Patches { patches: Vec<WirePatch> },
    Full { html: String },
}

fn parse_record(raw_line: &str) -> Result<WireRecord, ParseError> {
    serde_json::from_str(raw_line).map_err(|e| ParseError {
        raw_line: raw_line.to_string(),
        message: e.to_string(),
    })
}

fn decode_patches(raw_line: &str, wire: Vec<WirePatch>) -> Result<Vec<Patch>, ParseError> {
    wire.into_iter()
        .map(Patch::try_from)
        .collect::<Result<Vec<_>, String>>()
        .map_err(|message| ParseError {
            raw_line: raw_line.to_string(),
            message,
        })
}

/// What stopped one attempt.
enum AttemptOutcome {
    /// The generator finished cleanly.
    Finished,
    /// A recoverable error occurred; the attempt is abandoned.
    Recoverable(RecoverableError),
}

async fn run_attempt(
    generator: &dyn Generator,
    session_id: &str,
    batch: &[Action],
    model: Option<&str>,
    current_html: &mut Option<String>,
    scratch: &mut ScratchDocument,
    emitted: &mut Vec<StreamEvent>,
    accepted_patch_count: &mut u32,
    usage_total: &mut Usage,
) -> AttemptOutcome {
    let mut stream = generator
        .open_stream(session_id, batch, model, current_html.as_deref())
        .await;
    let mut accumulator = LineAccumulator::default();

    while let Some(token) = stream.next().await {
        let token = match token {
            Ok(token) => token,
            Err(e) => return AttemptOutcome::Recoverable(e),
        };

        match token {
            GeneratorToken::Text(chunk) => {
                for line in accumulator.feed(&chunk) {
                    let record = match parse_record(&line) {
                        Ok(r) => r,
                        Err(e) => return AttemptOutcome::Recoverable(e.into()),
                    };
                    match record {
                        WireRecord::Patches { patches } => {
                            let patches = match decode_patches(&line, patches) {
                                Ok(p) => p,
                                Err(e) => return AttemptOutcome::Recoverable(e.into()),
                            };
                            if let Err(e) = scratch.apply_all(&patches) {
                                return AttemptOutcome::Recoverable(e.into());
                            }
                            *accepted_patch_count += patches.len() as u32;
                            emitted.push(StreamEvent::Patches { patches });
                        }
                        WireRecord::Full { html } => {
                            *current_html = Some(html.clone());
                            *scratch = ScratchDocument::new();
                            scratch.seed("root", html.clone());
                            emitted.push(StreamEvent::Full { html });
                        }
                    }
                }
            }
            GeneratorToken::ToolCall { .. } => {
                // Forwarded to the (out-of-scope) Tool adapter; not our concern.
            }
            GeneratorToken::FinishStep { usage } => {
                usage_total.input_tokens += usage.input_tokens;
                usage_total.output_tokens += usage.output_tokens;
            }
            GeneratorToken::Finish => return AttemptOutcome::Finished,
        }
    }

    AttemptOutcome::Finished
}

fn corrective_action(error: &RecoverableError, accepted_patch_count: u32) -> Action {
    Action::Prompt {
        text: format!(
            "Your previous response could not be applied: {error}. \
             {accepted_patch_count} patches were already accepted and must not be repeated. \
             Continue from there with a corrected response.",
        ),
        model: None,
        context: None,
    }
}

/// Runs a generator invocation to completion, retrying with a corrective
/// continuation on recoverable error, and returns the validated event
/// sequence the subscriber should see.
///
/// Seeds the scratch document from `initial_html` (spec §4.5 step 1: a
/// standalone `run` has no prior scratch state to resume, so the session's
/// current HTML is its only source of known element ids). `html` is taken
/// as the inner HTML of a single root element with id `root`, the same
/// convention a `Full`/`Done` event uses going forward.
pub async fn run(
    generator: &dyn Generator,
    session_id: &str,
    batch: &[Action],
    model: Option<&str>,
    initial_html: Option<String>,
    max_attempts: u32,
) -> Result<Vec<StreamEvent>, RetryError> {
    let mut scratch = ScratchDocument::new();
    if let Some(html) = &initial_html {
        scratch.seed("root", html.clone());
    }
    run_with_scratch(
        generator,
        session_id,
        batch,
        model,
        initial_html,
        &mut scratch,
        max_attempts,
    )
    .await
}

/// Like [`run`], but validates against a scratch document the caller owns
/// and keeps across calls — a Processor carries one alongside its
/// `current_html` so that ids established by an earlier batch's `Patches`
/// survive into the next one (spec §4.5 step 1).
pub async fn run_with_scratch(
    generator: &dyn Generator,
    session_id: &str,
    batch: &[Action],
    model: Option<&str>,
    initial_html: Option<String>,
    scratch: &mut ScratchDocument,
    max_attempts: u32,
) -> Result<Vec<StreamEvent>, RetryError> {
    debug_assert!(max_attempts >= 1);

    let mut current_html = initial_html;
    let mut emitted = Vec::new();
    let mut accepted_patch_count = 0u32;
    let mut usage_total = Usage::default();
    let mut current_batch: Vec<Action> = batch.to_vec();

    for attempt in 0..max_attempts {
        let outcome = run_attempt(
            generator,
            session_id,
            &current_batch,
            model,
            &mut current_html,
            scratch,
            &mut emitted,
            &mut accepted_patch_count,
            &mut usage_total,
        )
        .await;

        match outcome {
            AttemptOutcome::Finished => {
                emitted.push(StreamEvent::Stats(Stats {
                    cache_rate: 0.0,
                    tokens_per_second: 0.0,
                    mode: "default".to_string(),
                    patch_count: accepted_patch_count,
                }));
                emitted.push(StreamEvent::Done {
                    html: current_html.clone().unwrap_or_default(),
                });
                return Ok(emitted);
            }
            AttemptOutcome::Recoverable(error) => {
                if attempt + 1 >= max_attempts {
                    return Err(RetryError::MaxAttemptsExceeded {
                        attempts: max_attempts,
                    });
                }
                // Spec §4.5 step 4: the continuation carries the original
                // messages plus the failure description, not the failure
                // alone — the generator still needs to know what was asked.
                let mut next_batch = batch.to_vec();
                next_batch.push(corrective_action(&error, accepted_patch_count));
                current_batch = next_batch;
            }
        }
    }

    Err(RetryError::MaxAttemptsExceeded {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;

    #[tokio::test]
    async fn happy_path_emits_patches_then_stats_and_done() {
        let generator = MockGenerator::new();
        generator.queue_lines(vec![r#"{"type":"full","html":"<div id=\"root\"></div>"}"#]);

        let events = run(&generator, "s", &[], None, None, 3).await.unwrap();

        assert!(matches!(events[0], StreamEvent::Full { .. }));
        assert!(matches!(events[1], StreamEvent::Stats(_)));
        assert!(matches!(events[2], StreamEvent::Done { .. }));
    }

    #[tokio::test]
    async fn malformed_json_line_is_recoverable_and_retried() {
        let generator = MockGenerator::new();
        generator.queue_lines(vec!["not json at all"]);
        generator.queue_lines(vec![r#"{"type":"full","html":"<p>ok</p>"}"#]);

        let events = run(&generator, "s", &[], None, None, 3).await.unwrap();
        assert!(events.iter().any(|e| matches!(e, StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn exhausting_attempts_without_recovery_fails() {
        let generator = MockGenerator::new();
        generator.queue_lines(vec!["bad"]);
        generator.queue_lines(vec!["still bad"]);

        let result = run(&generator, "s", &[], None, None, 2).await;
        assert!(matches!(
            result,
            Err(RetryError::MaxAttemptsExceeded { attempts: 2 })
        ));
    }

    #[tokio::test]
    async fn retry_recovery_matches_scenario_s6() {
        // Attempt 0: one valid patch against #a, then an invalid patch
        // against a selector that doesn't exist.
        let generator = MockGenerator::new();
        generator.queue_lines(vec![
            r#"{"type":"patches","patches":[{"selector":"#a","text":"one"}]}"#,
            r#"{"type":"patches","patches":[{"selector":"#does-not-exist","text":"bad"}]}"#,
        ]);
        // Attempt 1 (corrective continuation): two valid patches.
        generator.queue_lines(vec![
            r#"{"type":"patches","patches":[{"selector":"#a","text":"x"},{"selector":"#b","text":"y"}]}"#,
        ]);

        let mut scratch = ScratchDocument::new();
        scratch.seed("a", "");
        scratch.seed("b", "");

        let events = run_with_scratch(&generator, "s", &[], None, None, &mut scratch, 3)
            .await
            .unwrap();

        let patch_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Patches { .. }))
            .collect();
        // One `Patches` event from attempt 0 (the valid patch only; the
        // invalid one aborted that attempt before it could be emitted) plus
        // one from attempt 1's corrective continuation — three patches
        // total, never the rejected one, never re-emitted.
        assert_eq!(patch_events.len(), 2);
        let StreamEvent::Patches { patches } = patch_events[0] else {
            unreachable!()
        };
        assert_eq!(patches.len(), 1);
        let StreamEvent::Patches { patches } = patch_events[1] else {
            unreachable!()
        };
        assert_eq!(patches.len(), 2);
    }

    #[tokio::test]
    async fn run_seeds_scratch_from_initial_html_so_a_later_patch_on_root_applies() {
        // No prior scratch state, but a session with existing HTML: a batch
        // whose only output is a patch against `#root` must validate, the
        // same way a fresh session's first `Full` establishes that id.
        let generator = MockGenerator::new();
        generator.queue_lines(vec![
            r#"{"type":"patches","patches":[{"selector":"#root","text":"hello"}]}"#,
        ]);

        let events = run(
            &generator,
            "s",
            &[],
            None,
            Some("<div>hi</div>".to_string()),
            3,
        )
        .await
        .unwrap();

        assert!(events.iter().any(|e| matches!(e, StreamEvent::Patches { patches } if patches.len() == 1)));
    }

    #[tokio::test]
    async fn a_full_record_reseeds_scratch_so_a_later_batch_can_patch_root() {
        let generator = MockGenerator::new();
        generator.queue_lines(vec![r#"{"type":"full","html":"<div>one</div>"}"#]);

        let mut scratch = ScratchDocument::new();
        let first = run_with_scratch(&generator, "s", &[], None, None, &mut scratch, 1)
            .await
            .unwrap();
        assert!(first.iter().any(|e| matches!(e, StreamEvent::Full { .. })));

        generator.queue_lines(vec![
            r#"{"type":"patches","patches":[{"selector":"#root","text":"two"}]}"#,
        ]);
        let second = run_with_scratch(&generator, "s", &[], None, None, &mut scratch, 1)
            .await
            .unwrap();
        assert!(second.iter().any(|e| matches!(e, StreamEvent::Patches { .. })));
    }

    #[tokio::test]
    async fn corrective_continuation_retains_the_original_batch() {
        let generator = MockGenerator::new();
        generator.queue_lines(vec!["not json"]);
        generator.queue_lines(vec![r#"{"type":"full","html":"<p>ok</p>"}"#]);

        let seen_batches = generator.seen_batches();
        let batch = vec![Action::Prompt {
            text: "build a dashboard".to_string(),
            model: None,
            context: None,
        }];

        run(&generator, "s", &batch, None, None, 3).await.unwrap();

        let batches = seen_batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], batch);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(batches[1][0], batch[0]);
        assert!(matches!(&batches[1][1], Action::Prompt { text, .. } if text.contains("could not be applied")));
    }

    #[test]
    fn line_accumulator_splits_on_newlines_across_feeds() {
        let mut acc = LineAccumulator::default();
        assert!(acc.feed("{\"a\":1}\n{\"b\":").is_empty() == false);
        let lines = acc.feed("2}\n");
        assert_eq!(lines, vec!["{\"b\":2}"]);
    }

    #[test]
    fn line_accumulator_ignores_blank_lines() {
        let mut acc = LineAccumulator::default();
        let lines = acc.feed("\n\n{\"x\":1}\n");
        assert_eq!(lines, vec!["{\"x\":1}"]);
    }
}
