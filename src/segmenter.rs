// In: src/segmenter.rs

//! Groups a flat record stream into events.
//!
//! Particles accumulate until an `EventBoundary`; the boundary flushes the
//! current event if it has any particles. Consecutive boundaries are therefore
//! equivalent to one, and no empty event is ever yielded.

use crate::error::EbeError;
use crate::types::{Event, Record};

/// Lazy event iterator over a fallible record stream.
///
/// The first error is passed through and ends iteration; the partially built
/// event is discarded.
pub struct EventSegmenter<I> {
    records: I,
    current: Event,
    done: bool,
    events_emitted: usize,
}

impl<I> EventSegmenter<I>
where
    I: Iterator<Item = Result<Record, EbeError>>,
{
    pub fn new(records: I) -> Self {
        Self {
            records,
            current: Vec::new(),
            done: false,
            events_emitted: 0,
        }
    }

    pub fn events_emitted(&self) -> usize {
        self.events_emitted
    }

    fn take_current(&mut self) -> Option<Event> {
        if self.current.is_empty() {
            return None;
        }
        self.events_emitted += 1;
        // keep a similarly sized allocation for the next event
        let capacity = self.current.len();
        Some(std::mem::replace(&mut self.current, Vec::with_capacity(capacity)))
    }
}

impl<I> Iterator for EventSegmenter<I>
where
    I: Iterator<Item = Result<Record, EbeError>>,
{
    type Item = Result<Event, EbeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.records.next() {
                Some(Ok(Record::Particle(p))) => self.current.push(p),
                Some(Ok(Record::EventBoundary)) => {
                    if let Some(event) = self.take_current() {
                        return Some(Ok(event));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.current.clear();
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.take_current().map(Ok);
                }
            }
        }
    }
}

/// Segments an infallible record sequence.
pub fn segment<I>(records: I) -> impl Iterator<Item = Event>
where
    I: IntoIterator<Item = Record>,
{
    EventSegmenter::new(records.into_iter().map(Ok)).filter_map(Result::ok)
}
