//! Potential functions: per-document statistics for a clique
//!
//! A [`PotentialFunction`] owns one positional cursor per concept term and turns
//! the postings under those cursors into the frequency its clique scores. Term
//! cliques report the term frequency; window cliques count window matches over
//! the term positions.
//!
//! Window matching is a pure function of the per-term position arrays
//! ([`count_ordered_windows`], [`count_unordered_windows`]), so statistics read
//! from postings and from forward-index document vectors agree exactly.

use log::trace;

use super::clique::CliqueType;
use crate::error::Result;
use crate::evidence::GlobalTermEvidence;
use crate::structures::{PositionPostingIterator, TERMINATED};
use crate::{DocId, TermFreq, TermId};

/// Count ordered window matches (`#od`)
///
/// A match is a chain `p1 < p2 < ... < pn` taking one position per slot in slot
/// order with `0 < p(i+1) - p(i) <= window`. Chains start at an occurrence of the
/// first slot, scanned left to right; a position belongs to at most one match.
pub fn count_ordered_windows(slots: &[&[u32]], window: u32) -> TermFreq {
    let Some((first, rest)) = slots.split_first() else {
        return 0;
    };
    if rest.is_empty() {
        return first.len() as TermFreq;
    }

    let mut matches = 0;
    // Last position consumed by the previous match
    let mut floor: Option<u32> = None;

    for &start in first.iter() {
        if floor.is_some_and(|f| start <= f) {
            continue;
        }
        if let Some(end) = extend_chain(rest, start, window) {
            matches += 1;
            floor = Some(end);
        }
    }
    matches
}

/// End of the first chain through `slots` continuing from `prev`
///
/// Candidates for each slot are tried in ascending order, so the tightest
/// chain wins and a wider gap is only taken when the tighter one dead-ends.
fn extend_chain(slots: &[&[u32]], prev: u32, window: u32) -> Option<u32> {
    let Some((positions, rest)) = slots.split_first() else {
        return Some(prev);
    };
    let from = positions.partition_point(|&p| p <= prev);
    positions[from..]
        .iter()
        .take_while(|&&next| next - prev <= window)
        .find_map(|&next| extend_chain(rest, next, window))
}

/// Count unordered window matches (`#uw`)
///
/// A match is a span holding one occurrence of every slot, in any order, with
/// `max - min + 1 <= window`. For each candidate start the shortest span is
/// taken; matches are counted left to right and never overlap. A term repeated
/// in the concept needs that many distinct occurrences inside the span.
pub fn count_unordered_windows(slots: &[&[u32]], window: u32) -> TermFreq {
    if slots.is_empty() || slots.iter().any(|s| s.is_empty()) {
        return 0;
    }

    // Slots with identical non-empty positions are the same term
    let mut groups: Vec<(&[u32], usize)> = Vec::with_capacity(slots.len());
    for slot in slots {
        match groups.iter_mut().find(|(positions, _)| positions == slot) {
            Some((_, required)) => *required += 1,
            None => groups.push((*slot, 1)),
        }
    }
    if groups.len() == 1 && groups[0].1 == 1 {
        return groups[0].0.len() as TermFreq;
    }

    let mut starts: Vec<u32> = groups
        .iter()
        .flat_map(|(positions, _)| positions.iter().copied())
        .collect();
    starts.sort_unstable();
    starts.dedup();

    let mut matches = 0;
    let mut floor: Option<u32> = None;
    for start in starts {
        if floor.is_some_and(|f| start <= f) {
            continue;
        }
        let mut end = start;
        for (positions, required) in &groups {
            let idx = positions.partition_point(|&p| p < start);
            match positions.get(idx + required - 1) {
                Some(&p) => end = end.max(p),
                // Later starts cannot find this term either
                None => return matches,
            }
        }
        if end - start < window {
            matches += 1;
            floor = Some(end);
        }
    }
    matches
}

/// Frequency of a clique given per-slot positions in one document
pub fn clique_frequency(clique_type: CliqueType, window: u32, slots: &[&[u32]]) -> TermFreq {
    match clique_type {
        CliqueType::Term => slots.first().map_or(0, |s| s.len() as TermFreq),
        CliqueType::OrderedWindow => count_ordered_windows(slots, window),
        CliqueType::UnorderedWindow => count_unordered_windows(slots, window),
    }
}

/// Supplies (tf, positions) for one clique from its term postings
pub struct PotentialFunction {
    clique_type: CliqueType,
    window: u32,
    /// One cursor per concept slot; absent terms get an empty cursor
    cursors: Vec<PositionPostingIterator>,
    /// Forward-index term ids per slot; `None` for terms outside the vocabulary
    term_ids: Vec<Option<TermId>>,
}

impl PotentialFunction {
    pub fn new(
        clique_type: CliqueType,
        window: u32,
        cursors: Vec<PositionPostingIterator>,
        term_ids: Vec<Option<TermId>>,
    ) -> Self {
        debug_assert_eq!(cursors.len(), term_ids.len());
        Self {
            clique_type,
            window,
            cursors,
            term_ids,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.cursors.len()
    }

    pub fn term_ids(&self) -> &[Option<TermId>] {
        &self.term_ids
    }

    /// Docno under the first cursor
    pub fn doc(&self) -> DocId {
        self.cursors.first().map_or(TERMINATED, |c| c.doc())
    }

    /// Positions of `slot` in the current document
    pub fn positions(&self, slot: usize) -> &[u32] {
        self.cursors.get(slot).map(|c| c.positions()).unwrap_or(&[])
    }

    /// Rewind every cursor to the start of its postings
    pub fn reset(&mut self) -> Result<()> {
        for cursor in &mut self.cursors {
            cursor.reset()?;
        }
        Ok(())
    }

    /// Move every cursor to `doc` and return the clique frequency there
    ///
    /// Documents must be visited in ascending order between resets.
    pub fn frequency_at(&mut self, doc: DocId) -> Result<TermFreq> {
        let mut all_present = !self.cursors.is_empty();
        for cursor in &mut self.cursors {
            if cursor.seek(doc)? != doc {
                all_present = false;
            }
        }
        if !all_present {
            return Ok(0);
        }
        Ok(self.current_frequency())
    }

    /// Clique frequency for positions decoded from a document vector
    pub fn frequency_from_positions(&self, slots: &[&[u32]]) -> TermFreq {
        clique_frequency(self.clique_type, self.window, slots)
    }

    fn current_frequency(&self) -> TermFreq {
        if self.clique_type == CliqueType::Term {
            return self.cursors[0].term_freq();
        }
        let slots: Vec<&[u32]> = self.cursors.iter().map(|c| c.positions()).collect();
        clique_frequency(self.clique_type, self.window, &slots)
    }

    /// Move every cursor to the next document containing all slots
    fn next_conjunctive(&mut self) -> Result<DocId> {
        loop {
            let max_doc = self.cursors.iter().map(|c| c.doc()).max().unwrap_or(TERMINATED);
            if max_doc == TERMINATED {
                return Ok(TERMINATED);
            }

            let mut all_match = true;
            for cursor in &mut self.cursors {
                let doc = cursor.seek(max_doc)?;
                if doc != max_doc {
                    all_match = false;
                    if doc == TERMINATED {
                        return Ok(TERMINATED);
                    }
                }
            }
            if all_match {
                return Ok(max_doc);
            }
        }
    }

    /// Collection statistics of the clique's window concept
    ///
    /// Scans every document where all slots co-occur, counting matches, then
    /// rewinds the cursors for evaluation.
    pub fn scan_window_evidence(&mut self) -> Result<GlobalTermEvidence> {
        let mut evidence = GlobalTermEvidence::default();
        let mut doc = self.next_conjunctive()?;
        while doc != TERMINATED {
            let tf = self.current_frequency();
            if tf > 0 {
                evidence.df += 1;
                evidence.cf += tf as u64;
            }
            self.cursors[0].advance()?;
            doc = self.next_conjunctive()?;
        }
        self.reset()?;
        trace!(
            "window evidence ({:?}, {}): df={}, cf={}",
            self.clique_type, self.window, evidence.df, evidence.cf
        );
        Ok(evidence)
    }
}
