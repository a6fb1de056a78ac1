//! Ten-pin scoring over an ordered roll sequence.
//!
//! Every function here re-derives frames from the full roll history and never
//! fails. Pin counts are scored as recorded: values above ten, or two rolls
//! summing past ten, pass through unchanged. Rejecting them is the job of
//! [`crate::types::PinPolicy::Strict`] in the store.

use crate::{
    game::{Frame, Mark, ScoreCard},
    types::{ALL_PINS, FRAMES, GameStatus, Pins},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Strike,
    Spare,
    Open,
}

impl FrameKind {
    /// Rolls the frame consumes before the next frame starts.
    fn width(self) -> usize {
        match self {
            FrameKind::Strike => 1,
            FrameKind::Spare | FrameKind::Open => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameSpan {
    start: usize,
    kind: FrameKind,
    contribution: Option<u32>,
}

fn walk(rolls: &[Pins]) -> Vec<FrameSpan> {
    let pin = |i: usize| rolls.get(i).copied().map(u32::from);
    let rack = u32::from(ALL_PINS);
    let mut spans = Vec::with_capacity(FRAMES);
    let mut cursor = 0usize;

    while spans.len() < FRAMES {
        let Some(first) = pin(cursor) else {
            break;
        };

        let span = if first == rack {
            FrameSpan {
                start: cursor,
                kind: FrameKind::Strike,
                contribution: pin(cursor + 1)
                    .zip(pin(cursor + 2))
                    .map(|(a, b)| rack + a + b),
            }
        } else if pin(cursor + 1).is_some_and(|second| first + second == rack) {
            FrameSpan {
                start: cursor,
                kind: FrameKind::Spare,
                contribution: pin(cursor + 2).map(|bonus| rack + bonus),
            }
        } else {
            FrameSpan {
                start: cursor,
                kind: FrameKind::Open,
                contribution: pin(cursor + 1).map(|second| first + second),
            }
        };

        cursor += span.kind.width();
        spans.push(span);
    }

    spans
}

/// Rolls shown under frame `number`; the tenth frame also owns its bonus rolls.
fn frame_pins<'a>(rolls: &'a [Pins], number: usize, span: &FrameSpan) -> &'a [Pins] {
    let width = if number == FRAMES {
        match span.kind {
            FrameKind::Open => 2,
            FrameKind::Strike | FrameKind::Spare => 3,
        }
    } else {
        span.kind.width()
    };
    let end = (span.start + width).min(rolls.len());
    &rolls[span.start..end]
}

fn marks(pins: &[Pins]) -> Vec<Mark> {
    let mut out = Vec::with_capacity(pins.len());
    // Some(first ball) while the rack is half cleared.
    let mut half_rack: Option<Pins> = None;

    for &p in pins {
        let mark = match half_rack.take() {
            None if p == ALL_PINS => Mark::Strike,
            None => {
                half_rack = Some(p);
                Mark::Pins(p)
            }
            Some(first) if u32::from(first) + u32::from(p) == u32::from(ALL_PINS) => Mark::Spare,
            Some(_) => Mark::Pins(p),
        };
        out.push(mark);
    }

    out
}

fn rack_after(first: Pins) -> Pins {
    if first == ALL_PINS {
        ALL_PINS
    } else {
        ALL_PINS.saturating_sub(first)
    }
}

/// Points contributed by each begun frame, `None` while look-ahead is missing.
pub fn frame_contributions(rolls: &[Pins]) -> Vec<Option<u32>> {
    walk(rolls).into_iter().map(|s| s.contribution).collect()
}

/// Running total of all determined frames.
///
/// Pending frames add nothing, so during a game this is a partial score rather
/// than a final one.
pub fn total_score(rolls: &[Pins]) -> u32 {
    walk(rolls).iter().filter_map(|s| s.contribution).sum()
}

/// Cumulative score through each begun frame.
///
/// The first pending frame and every frame after it yield `None`.
pub fn running_totals(rolls: &[Pins]) -> Vec<Option<u32>> {
    let mut acc = Some(0u32);
    frame_contributions(rolls)
        .into_iter()
        .map(|c| {
            acc = acc.zip(c).map(|(sum, points)| sum + points);
            acc
        })
        .collect()
}

/// One [`Frame`] per frame holding at least one roll, in frame order.
///
/// Each frame's `score` is the game running total from [`total_score`], not an
/// incremental per-frame value.
pub fn frame_breakdown(rolls: &[Pins]) -> Vec<Frame> {
    let spans = walk(rolls);
    let total: u32 = spans.iter().filter_map(|s| s.contribution).sum();

    spans
        .iter()
        .enumerate()
        .map(|(idx, span)| {
            let pins = frame_pins(rolls, idx + 1, span).to_vec();
            Frame {
                frame: (idx + 1) as u8,
                rolls: marks(&pins),
                pins,
                score: total,
                contribution: span.contribution,
            }
        })
        .collect()
}

/// Pins available to the next roll, or `None` once the game is complete.
pub fn pins_standing(rolls: &[Pins]) -> Option<Pins> {
    let spans = walk(rolls);
    let Some(last) = spans.last() else {
        return Some(ALL_PINS);
    };
    let number = spans.len();
    let pins = frame_pins(rolls, number, last);

    if number < FRAMES {
        return match pins {
            [first] if last.kind == FrameKind::Open => Some(rack_after(*first)),
            _ => Some(ALL_PINS),
        };
    }

    match *pins {
        [] => Some(ALL_PINS),
        [first] => Some(rack_after(first)),
        [first, second] if first == ALL_PINS => Some(rack_after(second)),
        [first, second] if u32::from(first) + u32::from(second) == u32::from(ALL_PINS) => {
            Some(ALL_PINS)
        }
        _ => None,
    }
}

/// Completion state derived from the roll sequence.
pub fn game_status(rolls: &[Pins]) -> GameStatus {
    match pins_standing(rolls) {
        Some(_) => GameStatus::InProgress,
        None => GameStatus::Complete,
    }
}

/// Total, status and frame breakdown for one roll sequence.
pub fn score_card(rolls: &[Pins]) -> ScoreCard {
    let frames = frame_breakdown(rolls);
    ScoreCard {
        total: frames.first().map(|f| f.score).unwrap_or(0),
        status: game_status(rolls),
        frames,
    }
}
