// chatwin — Conversation message window engine for chat clients
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Request counters used to discard stale page responses.
//!
//! Every fetch is issued with a ticket. A response is applied only when its
//! ticket still matches the latest one for its direction and the conversation
//! has not been switched since.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Older,
    Newer,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub conversation: u64,
    pub direction: Direction,
    pub epoch: u64,
}

#[derive(Debug, Default)]
pub struct RequestEpochs {
    conversation: u64,
    older: u64,
    newer: u64,
    context: u64,
}

impl RequestEpochs {
    /// Issue a ticket, superseding every earlier ticket of the same direction.
    pub fn issue(&mut self, direction: Direction) -> RequestTicket {
        let slot = self.slot_mut(direction);
        *slot += 1;
        let epoch = *slot;
        RequestTicket { conversation: self.conversation, direction, epoch }
    }

    #[must_use]
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.conversation == self.conversation && self.slot(ticket.direction) == ticket.epoch
    }

    /// Invalidate outstanding tickets of one direction without issuing a new one.
    pub fn supersede(&mut self, direction: Direction) {
        *self.slot_mut(direction) += 1;
    }

    /// Invalidate every outstanding ticket. Used on conversation switch.
    pub fn next_conversation(&mut self) {
        self.conversation += 1;
    }

    #[must_use]
    pub fn conversation(&self) -> u64 {
        self.conversation
    }

    fn slot(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Older => self.older,
            Direction::Newer => self.newer,
            Direction::Context => self.context,
        }
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut u64 {
        match direction {
            Direction::Older => &mut self.older,
            Direction::Newer => &mut self.newer,
            Direction::Context => &mut self.context,
        }
    }
}
