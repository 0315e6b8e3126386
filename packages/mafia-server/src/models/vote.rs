use super::player::PlayerId;

#[derive(Debug, Clone)]
struct Ballot<C> {
    voter: PlayerId,
    choice: C,
    submitted: u64,
}

/// Per-phase ballots keyed by voter.
///
/// A voter may change their choice freely until the tally is sealed. Recasting
/// the same choice keeps its original submission time, so repeating a vote never
/// changes how a tie resolves.
#[derive(Debug, Clone)]
pub struct VoteTally<C> {
    ballots: Vec<Ballot<C>>,
    clock: u64,
    sealed: bool,
}

impl<C> Default for VoteTally<C> {
    fn default() -> Self {
        Self {
            ballots: Vec::new(),
            clock: 0,
            sealed: false,
        }
    }
}

impl<C: Clone + PartialEq> VoteTally<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `choice` for `voter`, replacing any earlier choice.
    ///
    /// # Panics
    /// If the tally has already been sealed for resolution.
    pub fn cast(&mut self, voter: &PlayerId, choice: C) {
        assert!(!self.sealed, "vote cast into a resolved tally");
        self.clock += 1;
        match self.ballots.iter_mut().find(|b| &b.voter == voter) {
            Some(ballot) if ballot.choice == choice => {}
            Some(ballot) => {
                ballot.choice = choice;
                ballot.submitted = self.clock;
            }
            None => self.ballots.push(Ballot {
                voter: voter.clone(),
                choice,
                submitted: self.clock,
            }),
        }
    }

    /// Drops a voter's ballot, e.g. when they leave the lobby.
    pub fn retract(&mut self, voter: &PlayerId) -> Option<C> {
        assert!(!self.sealed, "vote retracted from a resolved tally");
        let index = self.ballots.iter().position(|b| &b.voter == voter)?;
        Some(self.ballots.remove(index).choice)
    }

    pub fn choice_of(&self, voter: &PlayerId) -> Option<&C> {
        self.ballots
            .iter()
            .find(|b| &b.voter == voter)
            .map(|b| &b.choice)
    }

    pub fn has_voted(&self, voter: &PlayerId) -> bool {
        self.choice_of(voter).is_some()
    }

    pub fn all_submitted<'a>(&self, expected: impl IntoIterator<Item = &'a PlayerId>) -> bool {
        expected.into_iter().all(|voter| self.has_voted(voter))
    }

    pub fn count(&self, choice: &C) -> usize {
        self.ballots.iter().filter(|b| &b.choice == choice).count()
    }

    pub fn plurality(&self) -> Option<&C> {
        self.plurality_among(|_| true)
    }

    /// Most common choice among the voters accepted by `include`.
    ///
    /// Ties go to the choice whose earliest live ballot was submitted first.
    pub fn plurality_among(&self, include: impl Fn(&PlayerId) -> bool) -> Option<&C> {
        // (choice, supporters, earliest submission)
        let mut counts: Vec<(&C, usize, u64)> = Vec::new();
        for ballot in self.ballots.iter().filter(|b| include(&b.voter)) {
            match counts.iter_mut().find(|(c, _, _)| *c == &ballot.choice) {
                Some(entry) => {
                    entry.1 += 1;
                    entry.2 = entry.2.min(ballot.submitted);
                }
                None => counts.push((&ballot.choice, 1, ballot.submitted)),
            }
        }

        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(choice, _, _)| choice)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn clear(&mut self) {
        self.ballots.clear();
        self.sealed = false;
    }
}
