pub mod calendar;
pub mod client_state;
pub mod docpath;
pub mod domain;
pub mod onboarding;
pub mod ports;

pub use calendar::{Clock, ManualClock, SystemClock};
pub use domain::{
    Advice, Article, CareerGoal, ChatLogEntry, ChatMessage, ChatRole, Initiative, MessageStatus,
    NewCareerGoal, NewInitiative, NewQuest, NewRoutine, ProfileData, Quest, Routine,
    RoutineCompletion, User, UserProfileUpdate, UserStatus,
};
pub use ports::{
    Change, ChangeStream, DocumentSnapshot, DocumentStore, Orchestrator, PortError, PortResult,
    RelationalStore,
};
