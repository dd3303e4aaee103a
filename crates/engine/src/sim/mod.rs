mod clock;
mod grid;
mod interaction;
mod messages;
mod movement;
mod nav;
mod state;
mod transition;

pub use clock::{FixedStepClock, StepPlan};
pub use grid::{
    GridMap, GridMapError, MapSet, PlacedEntity, TileCoord, TileRegistry, TileType, Transition,
    DEFAULT_UNWALKABLE_TILES,
};
pub use interaction::{
    ClickTarget, GateDecision, InteractionGate, PendingCheck, PendingInteraction,
};
pub use messages::{GameMessage, MessageKind, MessageLog, DEFAULT_MESSAGE_LOG_CAPACITY};
pub use movement::{MovementController, MovementState, DEFAULT_STEP_INTERVAL_SECONDS};
pub use nav::{PathFinder, TilePath};
pub use state::{
    Backpack, PlayerStat, PlayerState, QuestState, RemovedEntities, Skill,
    DEFAULT_XP_TO_NEXT_LEVEL, ENDURANCE_MAX_ENERGY_BONUS, ENDURANCE_SKILL,
};
pub use transition::{Location, MapTransition, MapTransitionResolver};
