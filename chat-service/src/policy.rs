// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Blocking rules between the two members of a (potential) chatroom.

/// Pairwise block relationship as seen from the requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockState {
    pub me_blocks_them: bool,
    pub them_blocks_me: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// No chatroom exists yet for the pair.
    OpenNew,
    /// A chatroom exists; `joined` is the requester's own join state.
    OpenExisting { joined: bool },
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    CallerBlocksTarget,
    BlockedByTarget,
}

pub fn evaluate(action: GateAction, blocks: BlockState) -> Result<(), Denial> {
    if blocks.me_blocks_them {
        return Err(Denial::CallerBlocksTarget);
    }

    if !blocks.them_blocks_me {
        return Ok(());
    }

    match action {
        GateAction::OpenExisting { joined: true } => Ok(()),
        GateAction::OpenExisting { joined: false } | GateAction::OpenNew | GateAction::Send => {
            Err(Denial::BlockedByTarget)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: BlockState = BlockState {
        me_blocks_them: false,
        them_blocks_me: false,
    };
    const I_BLOCK: BlockState = BlockState {
        me_blocks_them: true,
        them_blocks_me: false,
    };
    const THEY_BLOCK: BlockState = BlockState {
        me_blocks_them: false,
        them_blocks_me: true,
    };
    const MUTUAL: BlockState = BlockState {
        me_blocks_them: true,
        them_blocks_me: true,
    };

    #[test]
    fn unblocked_pair_may_do_anything() {
        assert_eq!(evaluate(GateAction::OpenNew, CLEAR), Ok(()));
        assert_eq!(evaluate(GateAction::OpenExisting { joined: false }, CLEAR), Ok(()));
        assert_eq!(evaluate(GateAction::Send, CLEAR), Ok(()));
    }

    #[test]
    fn my_own_block_wins_over_every_action() {
        for action in [
            GateAction::OpenNew,
            GateAction::OpenExisting { joined: true },
            GateAction::OpenExisting { joined: false },
            GateAction::Send,
        ] {
            assert_eq!(evaluate(action, I_BLOCK), Err(Denial::CallerBlocksTarget));
            assert_eq!(evaluate(action, MUTUAL), Err(Denial::CallerBlocksTarget));
        }
    }

    #[test]
    fn blocked_by_target_keeps_joined_members_inside() {
        assert_eq!(evaluate(GateAction::OpenExisting { joined: true }, THEY_BLOCK), Ok(()));
        assert_eq!(
            evaluate(GateAction::OpenExisting { joined: false }, THEY_BLOCK),
            Err(Denial::BlockedByTarget)
        );
        assert_eq!(evaluate(GateAction::OpenNew, THEY_BLOCK), Err(Denial::BlockedByTarget));
    }

    #[test]
    fn send_is_stricter_than_opening() {
        assert_eq!(evaluate(GateAction::Send, THEY_BLOCK), Err(Denial::BlockedByTarget));
    }
}
