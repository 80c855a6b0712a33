use crate::iterator::Iter;

/// A cursor over a sorted, owned `Vec<(Vec<u8>, Vec<u8>)>`, used to
/// exercise `MergingIterator`/`TwoLevelIterator` without pulling in a
/// real memtable or block.
pub struct VecIter {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl VecIter {
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        VecIter { entries, pos: None }
    }
}

impl Iter for VecIter {
    fn valid(&self) -> bool {
        self.pos.is_some_and(|p| p < self.entries.len())
    }

    fn seek_to_first(&mut self) {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn seek(&mut self, target: &[u8]) {
        self.pos = self.entries.iter().position(|(k, _)| k.as_slice() >= target);
    }

    fn next(&mut self) {
        self.pos = self.pos.map(|p| p + 1);
    }

    fn prev(&mut self) {
        self.pos = match self.pos {
            Some(0) | None => None,
            Some(p) => Some(p - 1),
        };
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos.expect("valid iterator")].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos.expect("valid iterator")].1
    }
}
