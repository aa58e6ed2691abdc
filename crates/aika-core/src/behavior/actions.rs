//! World-interaction commands. All fire-and-forget: nothing waits for a server ack.

use std::time::Duration;

use super::Command;
use crate::protocol::{BlockAction, BlockPos, OutboundMessage, Vec3};
use crate::session::SelfState;
use crate::world::WorldTracker;

/// Block one unit ahead of the facing direction, at foot height.
pub fn block_in_front(me: &SelfState) -> BlockPos {
    let yaw = me.yaw.to_radians();
    Vec3::new(
        me.position.x + yaw.sin(),
        me.position.y,
        me.position.z - yaw.cos(),
    )
    .block()
}

/// Start breaking the block in front, stop after `hold`.
pub fn mine(me: &SelfState, hold: Duration) -> Vec<Command> {
    let position = block_in_front(me);
    let action = |action| OutboundMessage::BlockAction {
        runtime_id: me.runtime_id,
        action,
        position,
    };
    vec![
        Command::Send(action(BlockAction::StartBreak)),
        Command::SendAfter {
            delay: hold,
            msg: action(BlockAction::StopBreak),
        },
    ]
}

pub fn build(me: &SelfState) -> Command {
    Command::Send(OutboundMessage::PlaceBlock {
        block: block_in_front(me),
        player_pos: me.position,
    })
}

/// Attack the closest tracked entity within `radius`, if there is one.
pub fn fight(me: &SelfState, world: &WorldTracker, radius: f32) -> Option<Command> {
    let (target, _) = world.nearest_within(&me.position, radius)?;
    Some(Command::Send(OutboundMessage::Attack {
        target_runtime_id: target,
        player_pos: me.position,
    }))
}

pub fn craft(me: &SelfState) -> Command {
    Command::Send(OutboundMessage::OpenCrafting {
        position: me.position.block(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn me_at(x: f32, y: f32, z: f32, yaw: f32) -> SelfState {
        SelfState {
            runtime_id: 1,
            position: Vec3::new(x, y, z),
            yaw,
        }
    }

    #[test]
    fn block_in_front_follows_yaw() {
        // yaw 0 faces -z, yaw 90 faces +x.
        assert_eq!(
            block_in_front(&me_at(0.5, 64.0, 0.5, 0.0)),
            BlockPos { x: 0, y: 64, z: -1 }
        );
        assert_eq!(
            block_in_front(&me_at(0.5, 64.0, 0.5, 90.0)),
            BlockPos { x: 1, y: 64, z: 0 }
        );
    }

    #[test]
    fn mine_starts_then_stops_the_same_block() {
        let cmds = mine(&me_at(0.5, 64.0, 0.5, 0.0), Duration::from_secs(1));
        let [Command::Send(start), Command::SendAfter { delay, msg: stop }] = cmds.as_slice()
        else {
            panic!("unexpected commands: {cmds:?}");
        };
        assert_eq!(*delay, Duration::from_secs(1));
        let (
            OutboundMessage::BlockAction {
                action: BlockAction::StartBreak,
                position: a,
                ..
            },
            OutboundMessage::BlockAction {
                action: BlockAction::StopBreak,
                position: b,
                ..
            },
        ) = (start, stop)
        else {
            panic!("unexpected messages: {start:?} {stop:?}");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn fight_picks_nearest_in_range() {
        let mut world = WorldTracker::new();
        let now = Instant::now();
        world.on_entity_position(5, Vec3::new(3.0, 64.0, 0.0), now);
        world.on_entity_position(6, Vec3::new(20.0, 64.0, 0.0), now);
        let me = me_at(0.0, 64.0, 0.0, 0.0);
        assert_eq!(
            fight(&me, &world, 5.0),
            Some(Command::Send(OutboundMessage::Attack {
                target_runtime_id: 5,
                player_pos: me.position,
            }))
        );
        assert_eq!(fight(&me, &WorldTracker::new(), 5.0), None);
    }

    #[test]
    fn craft_opens_at_own_block() {
        assert_eq!(
            craft(&me_at(2.7, 64.2, -0.3, 0.0)),
            Command::Send(OutboundMessage::OpenCrafting {
                position: BlockPos { x: 2, y: 64, z: -1 }
            })
        );
    }
}
