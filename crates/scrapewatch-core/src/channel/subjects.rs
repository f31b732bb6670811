use std::collections::BTreeMap;

use scrapewatch_protocol::Subject;

/// Reference counts of subject interest.
///
/// The first acquire and the last release are the transitions that go on
/// the wire. The active set is what gets re-sent after a reconnect.
#[derive(Debug, Default)]
pub(crate) struct SubjectRegistry {
    counts: BTreeMap<Subject, usize>,
}

impl SubjectRegistry {
    /// Returns true when this is the first holder.
    pub(crate) fn acquire(&mut self, subject: &Subject) -> bool {
        let count = self.counts.entry(subject.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns true when this was the last holder.
    pub(crate) fn release(&mut self, subject: &Subject) -> bool {
        match self.counts.get_mut(subject) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(subject);
                true
            }
            None => false,
        }
    }

    pub(crate) fn active(&self) -> impl Iterator<Item = &Subject> {
        self.counts.keys()
    }

    pub(crate) fn holders(&self, subject: &Subject) -> usize {
        self.counts.get(subject).copied().unwrap_or(0)
    }
}
