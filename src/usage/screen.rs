use super::refresh::ScreenState;

/// Identifies a refresh started through [Screen::begin_refresh].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

/// Holds what is currently displayed. Results of refreshes that were superseded by a newer one are
/// discarded, the newest refresh always wins.
#[derive(Debug, Default)]
pub struct Screen {
    issued: u64,
    state: Option<ScreenState>,
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Replaces the displayed state if `ticket` belongs to the latest refresh. Returns whether the
    /// state was applied.
    pub fn apply(&mut self, ticket: RefreshTicket, state: ScreenState) -> bool {
        if ticket.0 != self.issued {
            return false;
        }
        self.state = Some(state);
        true
    }

    pub fn state(&self) -> Option<&ScreenState> {
        self.state.as_ref()
    }
}
