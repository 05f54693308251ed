use crate::aggregate::SpeciesAggregate;

#[derive(Debug, Clone)]
pub struct Pager {
    initial: usize,
    increment: usize,
    limit: usize,
    list_generation: Option<u64>,
}

impl Pager {
    pub fn new(initial: usize, increment: usize) -> Self {
        let initial = initial.max(1);
        Self {
            initial,
            increment: increment.max(1),
            limit: initial,
            list_generation: None,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn reset_if_changed(&mut self, list_generation: u64) {
        if self.list_generation != Some(list_generation) {
            self.list_generation = Some(list_generation);
            self.limit = self.initial;
        }
    }

    pub fn load_more(&mut self) {
        self.limit = self.limit.saturating_add(self.increment);
    }

    pub fn take<'a>(&self, aggregates: &'a [SpeciesAggregate]) -> &'a [SpeciesAggregate] {
        &aggregates[..aggregates.len().min(self.limit)]
    }

    pub fn has_more(&self, total: usize) -> bool {
        total > self.limit
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(20, 20)
    }
}
